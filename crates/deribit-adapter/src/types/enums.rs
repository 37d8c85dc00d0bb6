/*
[INPUT]:  Deployment environment names
[OUTPUT]: Domain enum resolving REST and WebSocket endpoints
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When endpoints move or new environments are added
*/

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const MAIN_REST_URL: &str = "https://www.deribit.com/api/v2";
const TEST_REST_URL: &str = "https://test.deribit.com/api/v2";
const MAIN_WS_URL: &str = "wss://www.deribit.com/ws/api/v2";
const TEST_WS_URL: &str = "wss://test.deribit.com/ws/api/v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    Main,
    Test,
}

impl Domain {
    pub fn rest_url(self) -> &'static str {
        match self {
            Domain::Main => MAIN_REST_URL,
            Domain::Test => TEST_REST_URL,
        }
    }

    pub fn ws_url(self) -> &'static str {
        match self {
            Domain::Main => MAIN_WS_URL,
            Domain::Test => TEST_WS_URL,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Main => f.write_str("main"),
            Domain::Test => f.write_str("test"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" => Ok(Domain::Main),
            "test" => Ok(Domain::Test),
            other => Err(format!("unknown domain: {other}")),
        }
    }
}
