/// RC4 keystream, one instance per direction.
pub struct Rc4 {
    i: u8,
    j: u8,
    state: [u8; 256],
}

impl Rc4 {
    pub fn new(key: &[u8]) -> Self {
        let mut state = [0u8; 256];
        for (i, value) in state.iter_mut().enumerate() {
            *value = i as u8;
        }

        let mut j: u8 = 0;
        if !key.is_empty() {
            for i in 0..256 {
                j = j.wrapping_add(state[i]).wrapping_add(key[i % key.len()]);
                state.swap(i, j as usize);
            }
        }

        Self { i: 0, j: 0, state }
    }

    fn next(&mut self) -> u8 {
        self.i = self.i.wrapping_add(1);
        self.j = self.j.wrapping_add(self.state[self.i as usize]);
        self.state.swap(self.i as usize, self.j as usize);
        let index = self.state[self.i as usize].wrapping_add(self.state[self.j as usize]);
        self.state[index as usize]
    }

    /// XORs `data` with the next bytes of the keystream. The same call decrypts.
    pub fn apply(&mut self, data: &mut [u8]) {
        for byte in data {
            *byte ^= self.next();
        }
    }
}

impl std::fmt::Debug for Rc4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rc4")
    }
}

/// Size of the wrapped key blob the client sends during key exchange.
pub const KEY_BLOB_SIZE: usize = 0x80;

/// What the client hands us during key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMaterial {
    /// Echoed back to the client to confirm the exchange.
    pub token: [u8; 16],
    /// Session key for both directions.
    pub key: [u8; 16],
}

/// Recovers the session key from the blob sent by the client.
pub trait KeyUnwrapper {
    fn unwrap_key(&self, blob: &[u8]) -> Option<KeyMaterial>;
}

/// Reads the blob as an unwrapped `token || key` pair. Only useful for local tools and tests,
/// as retail clients wrap it with the server's public key.
#[derive(Debug, Default)]
pub struct PlainKeyUnwrapper;

impl KeyUnwrapper for PlainKeyUnwrapper {
    fn unwrap_key(&self, blob: &[u8]) -> Option<KeyMaterial> {
        let token = blob.get(0..16)?.try_into().ok()?;
        let key = blob.get(16..32)?.try_into().ok()?;

        Some(KeyMaterial { token, key })
    }
}

/// Uses a session key shared ahead of time, read from a 16 byte key file.
/// The token is still taken from the start of the blob.
#[derive(Debug)]
pub struct StaticKeyUnwrapper {
    key: [u8; 16],
}

impl StaticKeyUnwrapper {
    pub fn new(key: [u8; 16]) -> Self {
        Self { key }
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let key = data.as_slice().try_into().map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("key file must hold exactly 16 bytes, not {}", data.len()),
            )
        })?;

        Ok(Self::new(key))
    }
}

impl KeyUnwrapper for StaticKeyUnwrapper {
    fn unwrap_key(&self, blob: &[u8]) -> Option<KeyMaterial> {
        let token = blob.get(0..16)?.try_into().ok()?;

        Some(KeyMaterial {
            token,
            key: self.key,
        })
    }
}
