//! VPC and VSwitch resource schemas

use apsarastack_core::schema::{AttributeSchema, AttributeType, ResourceSchema, Validator};

use crate::validators::{validate_cidr_network_address, validate_switch_cidr_network_address};

pub fn vpc_schema() -> ResourceSchema {
    ResourceSchema::new("apsarastack_vpc")
        .with_description("Virtual private cloud")
        .attribute(
            AttributeSchema::new("cidr_block", AttributeType::String)
                .required()
                .with_description("The CIDR block for the VPC")
                .with_validator(Validator::new(validate_cidr_network_address)),
        )
        .attribute(AttributeSchema::new("name", AttributeType::String))
        .attribute(AttributeSchema::new("description", AttributeType::String))
}

pub fn vswitch_schema() -> ResourceSchema {
    ResourceSchema::new("apsarastack_vswitches")
        .with_description("VSwitch inside a VPC")
        .attribute(AttributeSchema::new("vpc_id", AttributeType::String).required())
        .attribute(
            AttributeSchema::new("cidr_block", AttributeType::String)
                .required()
                .with_description("The CIDR block for the switch, mask between 16 and 29")
                .with_validator(Validator::new(validate_switch_cidr_network_address)),
        )
        .attribute(AttributeSchema::new("availability_zone", AttributeType::String).required())
        .attribute(AttributeSchema::new("name", AttributeType::String))
}
