pub mod prepare_env;
pub mod stub_gateway;
