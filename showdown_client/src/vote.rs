//! Winner vote resolution.
//!
//! The voter types either [`SELF_KEYWORD`] or another player's display name;
//! the name must match exactly.

use showdown_shared::net::ConnId;

use crate::client::ClientError;

/// Input that votes for oneself.
pub const SELF_KEYWORD: &str = "me";

/// Resolves typed input to a player id.
pub fn resolve<'a, I>(input: &str, self_id: Option<ConnId>, players: I) -> Result<ConnId, ClientError>
where
    I: IntoIterator<Item = (ConnId, &'a str)>,
{
    let input = input.trim();
    if input == SELF_KEYWORD {
        return self_id.ok_or(ClientError::NoSelfId);
    }
    players
        .into_iter()
        .find(|(_, name)| *name == input)
        .map(|(id, _)| id)
        .ok_or_else(|| ClientError::UnknownName(input.to_string()))
}
