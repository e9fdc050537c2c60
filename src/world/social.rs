use std::collections::HashMap;

use crate::network::ClientId;

use super::WorldError;

/// Maximum number of members in a party, host included.
pub const MAX_PARTY_SIZE: usize = 4;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct PartyId(pub u32);

#[derive(Debug, Clone)]
pub struct Party {
    pub name: String,
    host: ClientId,
    /// In join order, so the host comes first.
    members: Vec<ClientId>,
}

impl Party {
    pub fn host(&self) -> ClientId {
        self.host
    }

    pub fn members(&self) -> &[ClientId] {
        &self.members
    }

    pub fn get_member_count(&self) -> usize {
        self.members.len()
    }

    pub fn has_member(&self, client: ClientId) -> bool {
        self.members.contains(&client)
    }
}

/// All parties, plus which party each session is in. A session is in at most one party.
#[derive(Debug, Default)]
pub struct PartyManager {
    parties: HashMap<PartyId, Party>,
    memberships: HashMap<ClientId, PartyId>,
    next_id: u32,
}

impl PartyManager {
    pub fn get(&self, id: PartyId) -> Option<&Party> {
        self.parties.get(&id)
    }

    pub fn party_of(&self, client: ClientId) -> Option<PartyId> {
        self.memberships.get(&client).copied()
    }

    pub fn party_count(&self) -> usize {
        self.parties.len()
    }

    /// Creates a party hosted by `host`. Does nothing if `host` is already in a party.
    pub fn create_party(&mut self, host: ClientId, name: &str) -> Option<PartyId> {
        if self.memberships.contains_key(&host) {
            return None;
        }

        let id = PartyId(self.next_id);
        self.next_id += 1;

        self.parties.insert(
            id,
            Party {
                name: name.to_string(),
                host,
                members: vec![host],
            },
        );
        self.memberships.insert(host, id);
        tracing::info!("{host} created party {name}");

        Some(id)
    }

    pub fn add_to_party(&mut self, party: PartyId, client: ClientId) -> Result<(), WorldError> {
        if self.memberships.contains_key(&client) {
            return Err(WorldError::AlreadyInParty(client));
        }

        let target = self
            .parties
            .get_mut(&party)
            .ok_or(WorldError::PartyNotFound(party))?;
        if target.members.len() >= MAX_PARTY_SIZE {
            return Err(WorldError::PartyFull(party));
        }

        target.members.push(client);
        self.memberships.insert(client, party);

        Ok(())
    }

    /// Takes `client` out of its party and returns everyone who lost their party as a result. Removing the
    /// host dissolves the party.
    pub fn remove_from_party(&mut self, client: ClientId) -> Vec<ClientId> {
        let Some(id) = self.memberships.get(&client).copied() else {
            tracing::warn!("Tried to remove {client} from a party, but they aren't in one");
            return Vec::new();
        };
        let Some(party) = self.parties.get_mut(&id) else {
            self.memberships.remove(&client);
            return vec![client];
        };

        if party.host == client {
            let members = std::mem::take(&mut party.members);
            for member in &members {
                self.memberships.remove(member);
            }
            self.parties.remove(&id);
            tracing::info!("Party {} dissolved", id.0);

            members
        } else {
            party.members.retain(|member| *member != client);
            self.memberships.remove(&client);

            vec![client]
        }
    }
}
