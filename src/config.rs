use std::net::SocketAddr;
use std::path::PathBuf;

/// Settings for a single local run of a program listing.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub program: PathBuf,
    pub max_steps: Option<u64>,
    /// `(address, value)` pairs written to memory before the run.
    pub pokes: Vec<(u8, u8)>,
    pub json: bool,
    pub quiet: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen: SocketAddr,
    /// Upper bound on steps a single execute request may ask for.
    pub max_steps_per_request: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: SocketAddr::from(([127, 0, 0, 1], 3030)),
            max_steps_per_request: 10_000,
        }
    }
}

/// Parses `ADDR=VALUE`, both decimal or `0x`-prefixed hex.
pub fn parse_poke(arg: &str) -> Result<(u8, u8), String> {
    let (address, value) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected ADDR=VALUE, got `{}`", arg))?;
    Ok((parse_byte(address)?, parse_byte(value)?))
}

fn parse_byte(text: &str) -> Result<u8, String> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => text.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid byte `{}`: {}", text, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_poke() {
        assert_eq!(parse_poke("5=3"), Ok((5, 3)));
        assert_eq!(parse_poke("0x0A = 0xFF"), Ok((10, 255)));
        assert!(parse_poke("5").is_err());
        assert!(parse_poke("5=256").is_err());
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.listen.port(), 3030);
        assert_eq!(config.max_steps_per_request, 10_000);
    }
}
