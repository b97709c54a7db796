//! Gateway assembly

mod builder;

pub use builder::{
    DEFAULT_APP_NAME, DEFAULT_HOSTED_MODEL, DEFAULT_TITLE_MODEL, Gateway, GatewayBuilder,
    workers_ai_base_url,
};
