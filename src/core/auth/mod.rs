use std::path::PathBuf;

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity the game is launched with. Token acquisition and refresh
/// happen elsewhere; the launcher only consumes the result.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Account {
    Offline(OfflineAccount),
    Microsoft(MicrosoftAccount),
    Yggdrasil(YggdrasilAccount),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OfflineAccount {
    pub name: String,
    pub uuid: Uuid,
    /// Random per session.
    #[serde(skip, default = "session_token")]
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MicrosoftAccount {
    pub name: String,
    pub uuid: Uuid,
    pub access_token: String,
    pub xuid: String,
}

/// Third-party auth server account, launched through authlib-injector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct YggdrasilAccount {
    pub name: String,
    pub uuid: Uuid,
    pub access_token: String,
    pub server_url: String,
    pub authlib_injector: PathBuf,
}

impl Account {
    pub fn offline(name: &str) -> Self {
        Account::Offline(OfflineAccount::new(name))
    }

    pub fn name(&self) -> &str {
        match self {
            Account::Offline(a) => &a.name,
            Account::Microsoft(a) => &a.name,
            Account::Yggdrasil(a) => &a.name,
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Account::Offline(a) => a.uuid,
            Account::Microsoft(a) => a.uuid,
            Account::Yggdrasil(a) => a.uuid,
        }
    }

    pub fn access_token(&self) -> &str {
        match self {
            Account::Offline(a) => &a.access_token,
            Account::Microsoft(a) => &a.access_token,
            Account::Yggdrasil(a) => &a.access_token,
        }
    }

    /// Value of `${user_type}`.
    pub fn user_type(&self) -> &'static str {
        match self {
            Account::Offline(_) => "legacy",
            Account::Microsoft(_) => "msa",
            Account::Yggdrasil(_) => "mojang",
        }
    }

    pub fn xuid(&self) -> &str {
        match self {
            Account::Microsoft(a) => &a.xuid,
            _ => "0",
        }
    }

    /// JVM arguments the account needs ahead of the manifest's own.
    pub fn jvm_arguments(&self) -> Vec<String> {
        match self {
            Account::Yggdrasil(a) => vec![format!(
                "-javaagent:{}={}",
                a.authlib_injector.to_string_lossy(),
                a.server_url
            )],
            _ => Vec::new(),
        }
    }
}

impl OfflineAccount {
    pub fn new(name: &str) -> Self {
        let name = name.trim();
        Self {
            name: name.to_string(),
            uuid: offline_uuid(name),
            access_token: session_token(),
        }
    }
}

/// Name-based UUID v3 of `OfflinePlayer:<name>`, the same id servers in
/// offline mode assign.
pub fn offline_uuid(name: &str) -> Uuid {
    let digest = Md5::digest(format!("OfflinePlayer:{}", name).as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest);
    uuid::Builder::from_md5_bytes(bytes).into_uuid()
}

fn session_token() -> String {
    Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offline_uuid_is_deterministic_v3() {
        let uuid = offline_uuid("Notch");
        assert_eq!(uuid, offline_uuid("Notch"));
        assert_ne!(uuid, offline_uuid("notch"));
        assert_eq!(uuid.get_version_num(), 3);
    }

    #[test]
    fn offline_tokens_differ_per_session() {
        let a = Account::offline("Steve");
        let b = Account::offline("Steve");
        assert_eq!(a.uuid(), b.uuid());
        assert_ne!(a.access_token(), b.access_token());
        assert_eq!(a.access_token().len(), 32);
        assert!(a.access_token().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn yggdrasil_adds_javaagent() {
        let account = Account::Yggdrasil(YggdrasilAccount {
            name: "Alex".into(),
            uuid: Uuid::nil(),
            access_token: "token".into(),
            server_url: "https://auth.example.com/api/yggdrasil".into(),
            authlib_injector: PathBuf::from("/opt/authlib-injector.jar"),
        });
        assert_eq!(
            account.jvm_arguments(),
            vec!["-javaagent:/opt/authlib-injector.jar=https://auth.example.com/api/yggdrasil"]
        );
        assert!(Account::offline("Steve").jvm_arguments().is_empty());
    }
}
