// Re-export all public modules
pub mod shared;
pub mod route;
pub mod rpsl;
pub mod config;
pub mod index;
pub mod policy_set;
pub mod aut_num;
pub mod speaker;
pub mod document;
pub mod emitters;

// Re-export commonly used types at the crate root
pub use aut_num::{AutonomousSystem, PeeringSpec, RouteTable};
pub use config::ResolverConfig;
pub use document::PolicyDocument;
pub use emitters::{create_emitter, OutputEmitter};
pub use index::PolicyObjectIndex;
pub use policy_set::{MemberRef, PolicySet};
pub use route::{Prefix, RangeOp, Route, SurfaceOp};
pub use rpsl::{RpslObject, Token};
pub use shared::{PolicyError, SetKind, ANY_ADDRESS, ASN};
pub use speaker::{Peer, Speaker};
