use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdError;

// Principal identity = opaque id issued by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    /// Validate and wrap an id. Ids become path segments and halves of a
    /// chat key, so `/` and `_` are rejected.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        if let Some(c) = s.chars().find(|c| *c == '/' || *c == '_' || c.is_whitespace()) {
            return Err(IdError::ForbiddenChar(c));
        }
        Ok(Self(s.to_string()))
    }

    /// Mint a fresh id for a new account.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((end, _)) => &self.0[..end],
            None => &self.0,
        }
    }
}

impl std::fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for PrincipalId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PrincipalId> for String {
    fn from(id: PrincipalId) -> Self {
        id.0
    }
}

impl std::str::FromStr for PrincipalId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Key of the single chat session shared by an unordered pair of
/// principals: both ids sorted and joined with `_`, so either side derives
/// the same key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChatId {
    first: PrincipalId,
    second: PrincipalId,
}

impl ChatId {
    pub fn for_pair(a: &PrincipalId, b: &PrincipalId) -> Result<Self, IdError> {
        if a == b {
            return Err(IdError::SameParticipant);
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        Ok(Self {
            first: first.clone(),
            second: second.clone(),
        })
    }

    pub fn parse(s: &str) -> Result<Self, IdError> {
        let (a, b) = s
            .split_once('_')
            .ok_or_else(|| IdError::MalformedChatId(s.to_string()))?;
        let a = PrincipalId::parse(a).map_err(|_| IdError::MalformedChatId(s.to_string()))?;
        let b = PrincipalId::parse(b).map_err(|_| IdError::MalformedChatId(s.to_string()))?;
        Self::for_pair(&a, &b)
    }

    pub fn participants(&self) -> [&PrincipalId; 2] {
        [&self.first, &self.second]
    }

    pub fn contains(&self, id: &PrincipalId) -> bool {
        &self.first == id || &self.second == id
    }

    /// The participant that is not `me`, if `me` takes part at all.
    pub fn partner_of(&self, me: &PrincipalId) -> Option<&PrincipalId> {
        if &self.first == me {
            Some(&self.second)
        } else if &self.second == me {
            Some(&self.first)
        } else {
            None
        }
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.first, self.second)
    }
}

impl TryFrom<String> for ChatId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChatId> for String {
    fn from(id: ChatId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(s: &str) -> PrincipalId {
        PrincipalId::parse(s).unwrap()
    }

    #[test]
    fn chat_id_is_order_independent() {
        let a = pid("alice");
        let b = pid("bob");
        assert_eq!(ChatId::for_pair(&a, &b).unwrap(), ChatId::for_pair(&b, &a).unwrap());
        assert_eq!(ChatId::for_pair(&b, &a).unwrap().to_string(), "alice_bob");
    }

    #[test]
    fn chat_id_parse_normalizes_order() {
        let id = ChatId::parse("zed_amy").unwrap();
        assert_eq!(id.to_string(), "amy_zed");
        assert_eq!(id.partner_of(&pid("zed")), Some(&pid("amy")));
        assert_eq!(id.partner_of(&pid("bob")), None);
    }

    #[test]
    fn chat_id_rejects_self_pair() {
        let a = pid("alice");
        assert_eq!(ChatId::for_pair(&a, &a), Err(IdError::SameParticipant));
        assert!(ChatId::parse("alice").is_err());
    }

    #[test]
    fn principal_id_rejects_separators() {
        assert_eq!(PrincipalId::parse(""), Err(IdError::Empty));
        assert_eq!(PrincipalId::parse("a/b"), Err(IdError::ForbiddenChar('/')));
        assert_eq!(PrincipalId::parse("a_b"), Err(IdError::ForbiddenChar('_')));
        assert!(PrincipalId::parse(PrincipalId::generate().as_str()).is_ok());
    }

    #[test]
    fn serde_uses_plain_strings() {
        let id = ChatId::for_pair(&pid("b"), &pid("a")).unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"a_b\"");
        let back: ChatId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
