//! Configuration management, copied in shape from the teacher's
//! `farm-rpc/src/config.rs`: a `serde`-derived struct round-tripped through
//! YAML, with a `lazy_static` default path under the user's config dir.

use std::fs::{create_dir_all, File};
use std::io::{self, Write};
use std::path::Path;

use serde_derive::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG_FILE: Option<String> = dirs_next::home_dir().map(|mut path| {
        path.extend(&[".config", "auctions-service", "config.yml"]);
        path.to_str().unwrap().to_string()
    });
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub http_addr: String,
    pub http_port: u16,
    pub alert_cycle_secs: u64,
    pub finalize_cycle_secs: u64,
    pub load_cycle_secs: u64,
    pub load_ahead_secs: i64,
    pub load_behind_secs: i64,
    pub finalize_delay_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_addr: "127.0.0.1".to_string(),
            http_port: 8000,
            alert_cycle_secs: 300,
            finalize_cycle_secs: 300,
            load_cycle_secs: 300,
            load_ahead_secs: 7_200,
            load_behind_secs: 7_200,
            finalize_delay_secs: 1_800,
        }
    }
}

impl Config {
    pub fn load(&mut self, config_file: &str) -> Result<(), io::Error> {
        let file = File::open(config_file)?;
        *self = serde_yaml::from_reader(file)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, format!("{:?}", err)))?;
        Ok(())
    }

    pub fn save(&self, config_file: &str) -> Result<(), io::Error> {
        let serialized = serde_yaml::to_string(self)
            .map_err(|err| io::Error::new(io::ErrorKind::Other, format!("{:?}", err)))?;

        if let Some(outdir) = Path::new(config_file).parent() {
            create_dir_all(outdir)?;
        }
        let mut file = File::create(config_file)?;
        file.write_all(&serialized.into_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default() {
        let config = Config::default();
        assert_eq!(config.http_port, 8000);
        assert_eq!(config.finalize_delay_secs, 1_800);
    }

    #[test]
    fn test_load_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        let path = path.to_str().unwrap();

        let config = Config {
            http_addr: "0.0.0.0".to_string(),
            http_port: 9999,
            alert_cycle_secs: 1,
            finalize_cycle_secs: 2,
            load_cycle_secs: 3,
            load_ahead_secs: 4,
            load_behind_secs: 5,
            finalize_delay_secs: 6,
        };
        config.save(path).unwrap();

        let mut loaded = Config::default();
        loaded.load(path).unwrap();
        assert_eq!(config, loaded);
    }
}
