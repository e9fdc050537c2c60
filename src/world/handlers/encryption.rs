use crate::{
    opcodes,
    packet::{KEY_BLOB_SIZE, KeyUnwrapper, PacketFlags, PacketReader},
};

use super::{HandlerContext, HandlerError, PacketHandler};

/// Recovers the session key from the client's wrapped blob and switches both directions to RC4.
pub struct KeyExchangeHandler {
    unwrapper: Box<dyn KeyUnwrapper>,
}

impl KeyExchangeHandler {
    pub fn new(unwrapper: Box<dyn KeyUnwrapper>) -> Self {
        Self { unwrapper }
    }
}

impl PacketHandler for KeyExchangeHandler {
    fn handle(
        &self,
        ctx: &mut HandlerContext,
        _flags: PacketFlags,
        payload: &[u8],
    ) -> Result<(), HandlerError> {
        if ctx.session.is_encrypted() {
            return Err(HandlerError::KeyExchange("session already has a key"));
        }

        let blob = PacketReader::new(payload).read_bytes(KEY_BLOB_SIZE)?;
        let material = self
            .unwrapper
            .unwrap_key(&blob)
            .ok_or(HandlerError::KeyExchange("could not unwrap the key blob"))?;

        ctx.session.set_key(&material.key);
        // the reply is the first encrypted frame
        ctx.session.send_packet(
            opcodes::server::KEY_EXCHANGE_RESPONSE,
            PacketFlags::empty(),
            &material.token,
        );

        tracing::info!("{} finished the key exchange", ctx.session.id);

        Ok(())
    }
}
