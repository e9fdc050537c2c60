use crate::{
    ipc::{ActionUpdate, FullMovementData, MovementAction, PackedMovement},
    opcodes,
    packet::PacketFlags,
};

use super::{HandlerContext, HandlerError, PacketHandler};

/// Live movement. Tracks the sender's pose and relays the packet untouched.
pub struct MovementHandler;

impl PacketHandler for MovementHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), HandlerError> {
        let movement = PackedMovement::read(payload)?;
        ctx.session.apply_movement(&movement);

        let position = ctx.session.location.position;
        tracing::debug!(
            "{} moving ({:?}) to ({}, {}, {})",
            ctx.session.id,
            movement.flags,
            position.x,
            position.y,
            position.z
        );

        ctx.broadcast(|other| other.send_packet(opcodes::server::MOVEMENT, flags, payload));

        Ok(())
    }
}

/// The sender stopped moving. The full record is normalised and sent on.
pub struct MovementEndHandler;

impl PacketHandler for MovementEndHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), HandlerError> {
        let mut movement = FullMovementData::read(payload)?;
        if movement.entity1.id == 0 && movement.entity2.id != 0 {
            movement.entity1 = movement.entity2;
        }
        movement.timestamp = 0;

        let position = movement.current_position;
        tracing::debug!(
            "{} stopped moving at ({}, {}, {})",
            ctx.session.id,
            position.x,
            position.y,
            position.z
        );

        let body = movement.to_bytes();
        ctx.broadcast(|other| {
            other.send_packet(
                opcodes::server::MOVEMENT_END,
                PacketFlags::OBJECT_RELATED,
                &body,
            )
        });

        Ok(())
    }
}

pub struct MovementActionHandler;

impl PacketHandler for MovementActionHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), HandlerError> {
        let action = MovementAction::read(payload)?;
        let sender = ctx
            .session
            .player_header()
            .ok_or(HandlerError::MissingUser(ctx.session.id))?;

        tracing::debug!("{} performed {}", ctx.session.id, action.command);

        let body = action.build(sender);
        ctx.broadcast(|other| {
            other.send_packet(
                opcodes::server::MOVEMENT_ACTION,
                PacketFlags::PACKED | PacketFlags::OBJECT_RELATED,
                &body,
            )
        });

        Ok(())
    }
}

pub struct ActionUpdateHandler;

impl PacketHandler for ActionUpdateHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), HandlerError> {
        let update = ActionUpdate::read(payload)?;

        ctx.broadcast(|other| {
            let Some(recipient) = other.player_header() else {
                tracing::warn!("{} has a character but no user, skipping", other.id);
                return;
            };
            other.send_packet(
                opcodes::server::ACTION_UPDATE,
                PacketFlags::OBJECT_RELATED,
                &update.build(recipient),
            );
        });

        Ok(())
    }
}
