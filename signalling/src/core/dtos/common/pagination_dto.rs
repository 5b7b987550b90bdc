use salvo::oapi::ToParameters;
use serde::{Deserialize, Serialize};
use validator_derive::Validate;

fn default_skip() -> i64 {
    0
}

fn default_limit() -> i64 {
    10
}

#[derive(Debug, Serialize, Deserialize, Validate, Clone, ToParameters)]
#[salvo(parameters(default_parameter_in = Query))]
pub struct PaginationDto {
    #[serde(default = "default_skip")]
    #[validate(range(min = 0))]
    pub skip: i64,

    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

impl Default for PaginationDto {
    fn default() -> Self {
        Self {
            skip: default_skip(),
            limit: default_limit(),
        }
    }
}
