//! ECS resource schemas: instance, security group rule, image share permission

use apsarastack_core::resource::Value;
use apsarastack_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

use crate::diff_suppress::{
    ALL_PORT_RANGE, ecs_security_group_rule_port_range_diff_suppress, kms_diff_suppress,
    vpc_type_resource_diff_suppress,
};
use crate::validators::int_between;

const IP_PROTOCOLS: &[&str] = &["tcp", "udp", "icmp", "gre", "all"];

pub fn instance_schema() -> ResourceSchema {
    ResourceSchema::new("apsarastack_instance")
        .with_description("ECS instance")
        .attribute(AttributeSchema::new("image_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("instance_type", AttributeType::String).required())
        .attribute(AttributeSchema::new("vswitch_id", AttributeType::String))
        .attribute(
            AttributeSchema::new("private_ip", AttributeType::String)
                .with_description("Only meaningful once the instance is in a VSwitch")
                .with_diff_suppress(vpc_type_resource_diff_suppress),
        )
        .attribute(AttributeSchema::new("password", AttributeType::String).sensitive())
        .attribute(
            AttributeSchema::new("kms_encrypted_password", AttributeType::String)
                .with_diff_suppress(kms_diff_suppress),
        )
        .attribute(AttributeSchema::new(
            "kms_encryption_context",
            AttributeType::Map(Box::new(AttributeType::String)),
        ))
}

pub fn security_group_rule_schema() -> ResourceSchema {
    ResourceSchema::new("apsarastack_security_group_rule")
        .with_description("Ingress or egress rule of a security group")
        .attribute(
            AttributeSchema::new(
                "type",
                AttributeType::Enum(vec!["ingress".to_string(), "egress".to_string()]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("security_group_id", AttributeType::String).required())
        .attribute(
            AttributeSchema::new(
                "ip_protocol",
                AttributeType::Enum(IP_PROTOCOLS.iter().map(|p| p.to_string()).collect()),
            )
            .required(),
        )
        .attribute(
            AttributeSchema::new("port_range", AttributeType::String)
                .with_default(Value::String(ALL_PORT_RANGE.to_string()))
                .with_diff_suppress(ecs_security_group_rule_port_range_diff_suppress),
        )
        .attribute(
            AttributeSchema::new("priority", AttributeType::Int)
                .with_default(Value::Int(1))
                .with_validator(int_between(1, 100)),
        )
        .attribute(AttributeSchema::new("cidr_ip", AttributeType::String))
}

pub fn image_share_permission_schema() -> ResourceSchema {
    ResourceSchema::new("apsarastack_image_share_permission")
        .with_description("Shares a custom image with another account")
        .attribute(AttributeSchema::new("image_id", AttributeType::String).required())
        .attribute(AttributeSchema::new("account_id", AttributeType::String).required())
}
