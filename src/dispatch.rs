use std::fmt;
use std::str::FromStr;

use reqwest::Method;

use crate::error::HandlerError;

/// The fixed set of local WebUI routes a job may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Txt2Img,
    Img2Img,
    GetModels,
    GetOptions,
    SetOptions,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Txt2Img,
        Operation::Img2Img,
        Operation::GetModels,
        Operation::GetOptions,
        Operation::SetOptions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Txt2Img => "txt2img",
            Operation::Img2Img => "img2img",
            Operation::GetModels => "getModels",
            Operation::GetOptions => "getOptions",
            Operation::SetOptions => "setOptions",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Operation::GetModels | Operation::GetOptions => Method::GET,
            Operation::Txt2Img | Operation::Img2Img | Operation::SetOptions => Method::POST,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Operation::Txt2Img => "/sdapi/v1/txt2img",
            Operation::Img2Img => "/sdapi/v1/img2img",
            Operation::GetModels => "/sdapi/v1/sd-models",
            Operation::GetOptions | Operation::SetOptions => "/sdapi/v1/options",
        }
    }
}

impl FromStr for Operation {
    type Err = HandlerError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.name() == name)
            .ok_or_else(|| HandlerError::UnknownOperation(name.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
