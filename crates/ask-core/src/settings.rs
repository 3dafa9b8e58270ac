use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    Public,
    Private,
}

impl std::str::FromStr for BotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(Self::Public),
            "private" => Ok(Self::Private),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl std::fmt::Display for BotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Public => f.write_str("public"),
            Self::Private => f.write_str("private"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    pub prefix: String,
    pub mode: BotMode,
    pub welcome_image_url: String,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: ".".into(),
            mode: BotMode::Public,
            welcome_image_url: "https://files.catbox.moe/scvigx.jpg".into(),
        }
    }
}

impl BotSettings {
    pub fn welcome_caption(&self) -> String {
        format!(
            "*Hello there ask-MD User! 👋🏻*\n\n> Bot connected\n\n*Thanks for using ask-MD*\n\n- *YOUR PREFIX:* = {}\n\n> *© Powered By ask Inc.*",
            self.prefix
        )
    }

    /// Strip the prefix and return the lowercased command word, if any.
    pub fn parse_command<'a>(&self, text: &'a str) -> Option<(String, &'a str)> {
        let rest = text.trim_start().strip_prefix(self.prefix.as_str())?;
        let mut parts = rest.trim_start().splitn(2, char::is_whitespace);
        let name = parts.next().filter(|n| !n.is_empty())?;
        Some((name.to_ascii_lowercase(), parts.next().unwrap_or("").trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_case_insensitively() {
        assert_eq!("PRIVATE".parse::<BotMode>().unwrap(), BotMode::Private);
        assert_eq!(" public ".parse::<BotMode>().unwrap(), BotMode::Public);
        assert!("secret".parse::<BotMode>().is_err());
    }

    #[test]
    fn commands_need_the_prefix() {
        let settings = BotSettings::default();
        assert_eq!(
            settings.parse_command(".Ping now"),
            Some(("ping".to_string(), "now"))
        );
        assert_eq!(settings.parse_command("ping"), None);
        assert_eq!(settings.parse_command("."), None);
    }

    #[test]
    fn caption_mentions_prefix() {
        let settings = BotSettings {
            prefix: "!".into(),
            ..BotSettings::default()
        };
        assert!(settings.welcome_caption().contains("*YOUR PREFIX:* = !"));
    }
}
