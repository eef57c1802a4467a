//! Provider block schema

use apsarastack_core::resource::Value;
use apsarastack_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::config::MAX_CONFIGURATION_SOURCE_LEN;
use crate::validators::{int_between, string_len_between};

/// Shortest and longest assumed-role session, in seconds
const SESSION_EXPIRATION_RANGE: (i64, i64) = (900, 3600);

fn string(name: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::String)
}

fn assume_role_schema() -> ResourceSchema {
    ResourceSchema::new("assume_role")
        .attribute(
            string("role_arn")
                .required()
                .with_description("ARN of the RAM role to assume; overrides the profile's role ARN"),
        )
        .attribute(
            string("session_name")
                .with_description("Session name used when assuming the role, `terraform` when unset"),
        )
        .attribute(string("policy").with_description("Policy further restricting the session"))
        .attribute(
            AttributeSchema::new("session_expiration", AttributeType::Int)
                .with_description("Session lifetime in seconds")
                .with_validator(int_between(
                    SESSION_EXPIRATION_RANGE.0,
                    SESSION_EXPIRATION_RANGE.1,
                )),
        )
}

fn endpoints_schema() -> ResourceSchema {
    ResourceSchema::new("endpoints")
        .attribute(string("ecs").with_description("Custom ECS endpoint"))
        .attribute(string("vpc").with_description("Custom VPC endpoint"))
        .attribute(string("sts").with_description("Custom STS endpoint"))
}

pub fn provider_schema() -> ResourceSchema {
    ResourceSchema::new("apsarastack")
        .with_description("ApsaraStack provider configuration")
        .attribute(
            string("access_key")
                .with_env_default(&["APSARASTACK_ACCESS_KEY"])
                .with_description("The access key for API operations")
                .sensitive(),
        )
        .attribute(
            string("secret_key")
                .with_env_default(&["APSARASTACK_SECRET_KEY"])
                .with_description("The secret key for API operations")
                .sensitive(),
        )
        .attribute(
            string("security_token")
                .with_env_default(&["APSARASTACK_SECURITY_TOKEN", "SECURITY_TOKEN"])
                .with_description("Only required when using Security Token Service credentials")
                .sensitive(),
        )
        .attribute(
            string("region")
                .with_env_default(&["APSARASTACK_REGION"])
                .with_description("Region resources are managed in"),
        )
        .attribute(
            string("ecs_role_name")
                .with_env_default(&["APSARASTACK_ECS_ROLE_NAME"])
                .with_description("RAM role attached to the ECS instance running the provider"),
        )
        .attribute(
            string("profile")
                .with_env_default(&["APSARASTACK_PROFILE"])
                .with_description("Name of the profile in the shared credentials file"),
        )
        .attribute(
            string("shared_credentials_file")
                .with_env_default(&["APSARASTACK_SHARED_CREDENTIALS_FILE"])
                .with_description("Path of the shared credentials file"),
        )
        .attribute(
            AttributeSchema::new("skip_region_validation", AttributeType::Bool)
                .with_default(Value::Bool(true)),
        )
        .attribute(
            AttributeSchema::new("insecure", AttributeType::Bool)
                .with_env_default(&["AS_INSECURE"])
                .with_default(Value::Bool(false))
                .with_description("Trust self-signed certificates"),
        )
        .attribute(string("proxy").with_description("Proxy URL for every request"))
        .attribute(
            string("domain")
                .with_description("Custom domain; every service endpoint becomes `<service>.<domain>`"),
        )
        .attribute(
            AttributeSchema::new(
                "protocol",
                AttributeType::Enum(vec!["HTTP".to_string(), "HTTPS".to_string()]),
            )
            .with_default(Value::String("HTTPS".to_string())),
        )
        .attribute(
            string("configuration_source")
                .with_validator(string_len_between(0, MAX_CONFIGURATION_SOURCE_LEN)),
        )
        .attribute(string("ots_instance_name"))
        .attribute(string("account_id"))
        .attribute(AttributeSchema::new(
            "assume_role",
            AttributeType::Block(Box::new(assume_role_schema())),
        ))
        .attribute(AttributeSchema::new(
            "endpoints",
            AttributeType::Block(Box::new(endpoints_schema())),
        ))
}
