use crate::{
    common::timestamp_msecs,
    opcodes,
    packet::{Opcode, PacketFlags, PacketReader, PacketWriter},
};

use super::{HandlerContext, HandlerError, PacketHandler};

pub struct PingHandler;

impl PacketHandler for PingHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        _payload: &[u8],
    ) -> Result<(), HandlerError> {
        tracing::debug!(
            "Received ping response from {} ({})",
            ctx.session.id,
            ctx.session.username().unwrap_or("unknown")
        );
        Ok(())
    }
}

/// Echoes the client's clock alongside the server's.
pub struct ClientTimeHandler;

impl PacketHandler for ClientTimeHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), HandlerError> {
        let client_time = PacketReader::new(payload).read_u64()?;

        let mut writer = PacketWriter::new();
        writer.write_u64(client_time);
        writer.write_u64(timestamp_msecs());
        ctx.session.send_packet(
            opcodes::server::SERVER_TIME,
            PacketFlags::empty(),
            &writer.into_inner(),
        );

        Ok(())
    }
}

pub struct LogoutHandler;

impl PacketHandler for LogoutHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        _payload: &[u8],
    ) -> Result<(), HandlerError> {
        tracing::info!("{} logged out", ctx.session.id);
        ctx.close_session();
        Ok(())
    }
}

/// Answers with `reply` carrying `size` zero bytes.
pub struct ZeroReplyHandler {
    pub reply: Opcode,
    pub size: usize,
}

impl PacketHandler for ZeroReplyHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        _payload: &[u8],
    ) -> Result<(), HandlerError> {
        ctx.session
            .send_packet(self.reply, PacketFlags::empty(), &vec![0; self.size]);
        Ok(())
    }
}
