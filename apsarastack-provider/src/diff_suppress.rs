//! Diff suppressors attached to resource attributes

use apsarastack_core::resource::ResourceData;

/// Port range meaning "every port" in a security group rule
pub const ALL_PORT_RANGE: &str = "-1/-1";

/// VPC-only attributes are ignored until the resource is placed in a VSwitch
pub fn vpc_type_resource_diff_suppress(
    _key: &str,
    _old: &str,
    _new: &str,
    data: &ResourceData,
) -> bool {
    data.get_str("vswitch_id").trim().is_empty()
}

/// KMS-encrypted password attributes are ignored while a plain password is set
pub fn kms_diff_suppress(_key: &str, _old: &str, _new: &str, data: &ResourceData) -> bool {
    ["password", "account_password"]
        .iter()
        .any(|key| data.get_ok(key).is_some())
}

/// Port range of a security group rule
///
/// For TCP and UDP the "all ports" range is ignored; for every other protocol
/// any range except "all ports" is ignored.
pub fn ecs_security_group_rule_port_range_diff_suppress(
    _key: &str,
    _old: &str,
    new: &str,
    data: &ResourceData,
) -> bool {
    match data.get_str("ip_protocol") {
        "tcp" | "udp" => new == ALL_PORT_RANGE,
        _ => new != ALL_PORT_RANGE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apsarastack_core::resource::Value;
    use std::collections::HashMap;

    fn data(pairs: &[(&str, &str)]) -> ResourceData {
        ResourceData::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn port_range_for_tcp_and_udp() {
        for protocol in ["tcp", "udp"] {
            let d = data(&[("ip_protocol", protocol)]);
            assert!(ecs_security_group_rule_port_range_diff_suppress(
                "port_range",
                "22/22",
                ALL_PORT_RANGE,
                &d
            ));
            assert!(!ecs_security_group_rule_port_range_diff_suppress(
                "port_range",
                ALL_PORT_RANGE,
                "80/80",
                &d
            ));
        }
    }

    #[test]
    fn port_range_for_other_protocols() {
        let d = data(&[("ip_protocol", "icmp")]);
        assert!(!ecs_security_group_rule_port_range_diff_suppress(
            "port_range",
            "80/80",
            ALL_PORT_RANGE,
            &d
        ));
        assert!(ecs_security_group_rule_port_range_diff_suppress(
            "port_range",
            ALL_PORT_RANGE,
            "80/80",
            &d
        ));
    }

    #[test]
    fn kms_suppressed_by_either_password() {
        let d = data(&[("account_password", "Passw0rd!")]);
        assert!(kms_diff_suppress("kms_encrypted_password", "a", "b", &d));

        let d = data(&[("password", "Passw0rd!"), ("account_password", "")]);
        assert!(kms_diff_suppress("kms_encrypted_password", "a", "b", &d));

        let d = data(&[("password", ""), ("account_password", "")]);
        assert!(!kms_diff_suppress("kms_encrypted_password", "a", "b", &d));
    }

    #[test]
    fn vpc_type_suppressed_without_vswitch() {
        assert!(vpc_type_resource_diff_suppress(
            "private_ip",
            "",
            "172.16.0.10",
            &data(&[("vswitch_id", "  ")])
        ));
        assert!(vpc_type_resource_diff_suppress(
            "private_ip",
            "",
            "172.16.0.10",
            &data(&[])
        ));
        assert!(!vpc_type_resource_diff_suppress(
            "private_ip",
            "",
            "172.16.0.10",
            &data(&[("vswitch_id", "vsw-123")])
        ));
    }
}
