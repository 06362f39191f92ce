//! Task networking: a public VPC spanning N zones, or imported subnets.

use crate::core::construct::Stack;
use crate::core::error::{MusabiError, Result};
use crate::core::intrinsics::{get_att, get_azs, reference, select};
use crate::core::types::{CfnResource, NetworkConfig};
use serde_json::{json, Value};
use std::net::Ipv4Addr;

/// Smallest subnet the platform accepts.
const MAX_SUBNET_PREFIX: u8 = 28;

/// Subnets and security groups the task's ENI is placed in.
#[derive(Debug, Clone)]
pub struct Network {
    pub subnets: Vec<Value>,
    pub security_groups: Vec<Value>,
    pub assign_public_ip: bool,
}

impl Network {
    /// `AwsVpcConfiguration` for a task launch.
    pub fn awsvpc_configuration(&self) -> Value {
        json!({
            "AssignPublicIp": if self.assign_public_ip { "ENABLED" } else { "DISABLED" },
            "SecurityGroups": self.security_groups,
            "Subnets": self.subnets,
        })
    }
}

/// Parse `a.b.c.d/p`; the address must be the network address.
pub fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    let invalid = || MusabiError::InvalidCidr(cidr.to_string());
    let (addr, prefix) = cidr.split_once('/').ok_or_else(invalid)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| invalid())?;
    let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
    if prefix > 32 {
        return Err(invalid());
    }
    let mask = u32::MAX.checked_shl(32 - u32::from(prefix)).unwrap_or(0);
    if u32::from(addr) & !mask != 0 {
        return Err(invalid());
    }
    Ok((addr, prefix))
}

/// Split a CIDR into `count` equal, aligned subnets.
pub fn split_cidr(cidr: &str, count: u8) -> Result<Vec<String>> {
    let (base, prefix) = parse_cidr(cidr)?;
    if count == 0 {
        return Err(MusabiError::InvalidCidr(format!("{} into 0 subnets", cidr)));
    }
    let bits = u8::try_from(u32::from(count).next_power_of_two().trailing_zeros())
        .map_err(|_| MusabiError::InvalidCidr(cidr.to_string()))?;
    let sub_prefix = prefix + bits;
    if sub_prefix > MAX_SUBNET_PREFIX {
        return Err(MusabiError::InvalidCidr(format!(
            "{} is too small for {} subnets",
            cidr, count
        )));
    }
    let size = 1u32 << (32 - u32::from(sub_prefix));
    Ok((0..u32::from(count))
        .map(|i| format!("{}/{}", Ipv4Addr::from(u32::from(base) + i * size), sub_prefix))
        .collect())
}

/// Declare networking under `scope` (or import it) and return the placement.
pub fn declare(stack: &mut Stack, scope: &str, config: &NetworkConfig) -> Result<Network> {
    if config.is_imported() {
        return import(stack, scope, config);
    }

    let vpc_id = stack.add(
        &[scope, "Vpc", "Resource"],
        CfnResource::new("AWS::EC2::VPC")
            .prop("CidrBlock", json!(config.cidr))
            .prop("EnableDnsHostnames", json!(true))
            .prop("EnableDnsSupport", json!(true))
            .prop("InstanceTenancy", json!("default"))
            .prop("Tags", name_tag(&format!("{}/{}/Vpc", stack.name(), scope))),
    )?;
    let igw_id = stack.add(
        &[scope, "Vpc", "IGW"],
        CfnResource::new("AWS::EC2::InternetGateway")
            .prop("Tags", name_tag(&format!("{}/{}/Vpc", stack.name(), scope))),
    )?;
    let attachment_id = stack.add(
        &[scope, "Vpc", "VPCGW"],
        CfnResource::new("AWS::EC2::VPCGatewayAttachment")
            .prop("VpcId", reference(&vpc_id))
            .prop("InternetGatewayId", reference(&igw_id)),
    )?;

    let mut subnets = Vec::new();
    for (i, block) in split_cidr(&config.cidr, config.max_azs)?.into_iter().enumerate() {
        let subnet_name = format!("PublicSubnet{}", i + 1);
        let subnet_id = stack.add(
            &[scope, "Vpc", subnet_name.as_str(), "Subnet"],
            CfnResource::new("AWS::EC2::Subnet")
                .prop("CidrBlock", json!(block))
                .prop("VpcId", reference(&vpc_id))
                .prop("AvailabilityZone", select(i, get_azs()))
                .prop("MapPublicIpOnLaunch", json!(true))
                .prop(
                    "Tags",
                    name_tag(&format!("{}/{}/Vpc/{}", stack.name(), scope, subnet_name)),
                ),
        )?;
        let table_id = stack.add(
            &[scope, "Vpc", subnet_name.as_str(), "RouteTable"],
            CfnResource::new("AWS::EC2::RouteTable").prop("VpcId", reference(&vpc_id)),
        )?;
        stack.add(
            &[scope, "Vpc", subnet_name.as_str(), "RouteTableAssociation"],
            CfnResource::new("AWS::EC2::SubnetRouteTableAssociation")
                .prop("RouteTableId", reference(&table_id))
                .prop("SubnetId", reference(&subnet_id)),
        )?;
        stack.add(
            &[scope, "Vpc", subnet_name.as_str(), "DefaultRoute"],
            CfnResource::new("AWS::EC2::Route")
                .prop("RouteTableId", reference(&table_id))
                .prop("DestinationCidrBlock", json!("0.0.0.0/0"))
                .prop("GatewayId", reference(&igw_id))
                .depends_on(&attachment_id),
        )?;
        subnets.push(reference(&subnet_id));
    }

    let security_groups = if config.security_group_ids.is_empty() {
        let sg = security_group(stack, scope, reference(&vpc_id))?;
        vec![get_att(&sg, "GroupId")]
    } else {
        config.security_group_ids.iter().map(|s| json!(s)).collect()
    };

    tracing::debug!(zones = config.max_azs, cidr = %config.cidr, "synthesized VPC");
    Ok(Network {
        subnets,
        security_groups,
        assign_public_ip: config.assign_public_ip.unwrap_or(true),
    })
}

fn import(stack: &mut Stack, scope: &str, config: &NetworkConfig) -> Result<Network> {
    let security_groups = if config.security_group_ids.is_empty() {
        let vpc = config.vpc_id.as_deref().unwrap_or_default();
        let sg = security_group(stack, scope, json!(vpc))?;
        vec![get_att(&sg, "GroupId")]
    } else {
        config.security_group_ids.iter().map(|s| json!(s)).collect()
    };
    Ok(Network {
        subnets: config.subnet_ids.iter().map(|s| json!(s)).collect(),
        security_groups,
        assign_public_ip: config.assign_public_ip.unwrap_or(false),
    })
}

fn security_group(stack: &mut Stack, scope: &str, vpc: Value) -> Result<String> {
    stack.add(
        &[scope, "SecurityGroup", "Resource"],
        CfnResource::new("AWS::EC2::SecurityGroup")
            .prop(
                "GroupDescription",
                json!(format!("{}/{}/SecurityGroup", stack.name(), scope)),
            )
            .prop(
                "SecurityGroupEgress",
                json!([{
                    "CidrIp": "0.0.0.0/0",
                    "Description": "Allow all outbound traffic by default",
                    "IpProtocol": "-1",
                }]),
            )
            .prop("VpcId", vpc),
    )
}

fn name_tag(name: &str) -> Value {
    json!([{ "Key": "Name", "Value": name }])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_network_parse_cidr() {
        assert_eq!(
            parse_cidr("10.0.0.0/16").unwrap(),
            (Ipv4Addr::new(10, 0, 0, 0), 16)
        );
        assert!(parse_cidr("10.0.0.1/16").is_err());
        assert!(parse_cidr("10.0.0.0").is_err());
        assert!(parse_cidr("10.0.0.0/33").is_err());
        assert!(parse_cidr("300.0.0.0/16").is_err());
    }

    #[test]
    fn test_network_split_two_zones() {
        assert_eq!(
            split_cidr("10.0.0.0/16", 2).unwrap(),
            vec!["10.0.0.0/17", "10.0.128.0/17"]
        );
    }

    #[test]
    fn test_network_split_three_zones_rounds_up() {
        assert_eq!(
            split_cidr("10.0.0.0/16", 3).unwrap(),
            vec!["10.0.0.0/18", "10.0.64.0/18", "10.0.128.0/18"]
        );
    }

    #[test]
    fn test_network_split_too_small() {
        assert!(split_cidr("10.0.0.0/28", 2).is_err());
        assert!(split_cidr("10.0.0.0/27", 3).is_err());
        assert!(split_cidr("10.0.0.0/16", 0).is_err());
    }

    #[test]
    fn test_network_split_smallest_subnets() {
        assert_eq!(
            split_cidr("10.0.0.0/27", 2).unwrap(),
            vec!["10.0.0.0/28", "10.0.0.16/28"]
        );
    }

    #[test]
    fn test_network_declare_vpc() {
        let mut stack = Stack::new("musabiStack", None);
        let net = declare(&mut stack, "Task", &NetworkConfig::default()).unwrap();
        assert_eq!(net.subnets.len(), 2);
        assert!(net.assign_public_ip);
        assert_eq!(net.security_groups.len(), 1);

        let types: Vec<&str> = stack
            .resources()
            .values()
            .map(|r| r.resource_type.as_str())
            .collect();
        assert_eq!(types.iter().filter(|t| **t == "AWS::EC2::Subnet").count(), 2);
        assert_eq!(types.iter().filter(|t| **t == "AWS::EC2::Route").count(), 2);
        assert!(types.contains(&"AWS::EC2::SecurityGroup"));

        let route = stack
            .resources()
            .values()
            .find(|r| r.resource_type == "AWS::EC2::Route")
            .unwrap();
        assert_eq!(route.depends_on.len(), 1);
        assert_eq!(
            net.awsvpc_configuration()["AssignPublicIp"],
            json!("ENABLED")
        );
    }

    #[test]
    fn test_network_import_subnets() {
        let mut stack = Stack::new("s", None);
        let config = NetworkConfig {
            vpc_id: Some("vpc-123".into()),
            subnet_ids: vec!["subnet-a".into(), "subnet-b".into()],
            security_group_ids: vec!["sg-1".into()],
            ..NetworkConfig::default()
        };
        let net = declare(&mut stack, "Task", &config).unwrap();
        assert!(stack.resources().is_empty());
        let cfg = net.awsvpc_configuration();
        assert_eq!(cfg["Subnets"], json!(["subnet-a", "subnet-b"]));
        assert_eq!(cfg["SecurityGroups"], json!(["sg-1"]));
        assert_eq!(cfg["AssignPublicIp"], "DISABLED");
    }

    #[test]
    fn test_network_import_synthesizes_security_group() {
        let mut stack = Stack::new("s", None);
        let config = NetworkConfig {
            vpc_id: Some("vpc-123".into()),
            subnet_ids: vec!["subnet-a".into()],
            ..NetworkConfig::default()
        };
        declare(&mut stack, "Task", &config).unwrap();
        let sg = stack.resources().values().next().unwrap();
        assert_eq!(sg.resource_type, "AWS::EC2::SecurityGroup");
        assert_eq!(sg.properties["VpcId"], "vpc-123");
    }

    proptest! {
        #[test]
        fn prop_network_subnets_disjoint_and_inside(count in 1u8..=6, second in 0u8..=255) {
            let cidr = format!("10.{}.0.0/16", second);
            let blocks = split_cidr(&cidr, count).unwrap();
            prop_assert_eq!(blocks.len(), usize::from(count));
            let mut starts = Vec::new();
            for b in &blocks {
                let (addr, prefix) = parse_cidr(b).unwrap();
                prop_assert!(prefix >= 16);
                let a = addr.octets();
                prop_assert_eq!(a[0], 10);
                prop_assert_eq!(a[1], second);
                starts.push(u32::from(addr));
            }
            starts.dedup();
            prop_assert_eq!(starts.len(), blocks.len());
        }
    }
}
