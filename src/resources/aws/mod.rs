//! AWS provider resources.

pub mod dynamodb;
pub mod ec2;
pub mod iam;
pub mod route53;
pub mod s3;
pub mod sfn;
pub mod vpc;

pub use dynamodb::aws_dynamodb_table;
pub use ec2::{aws_customer_gateway, aws_instance};
pub use iam::{aws_iam_openid_connect_provider, aws_iam_saml_provider};
pub use route53::{aws_route53_record, aws_route53_zone};
pub use s3::aws_s3_bucket;
pub use sfn::aws_sfn_activity;
pub use vpc::{aws_security_group, aws_subnet, aws_vpc};

use std::collections::BTreeMap;

pub type Tags = BTreeMap<String, String>;
