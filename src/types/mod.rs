pub mod descriptor;
pub mod symbol;
pub mod tree;

pub use descriptor::{Descriptor, ParentRef};
pub use symbol::{join_key, ChildRole, TypeSymbol};
pub use tree::{ChildDescriptor, CorpusMeta, DescriptorMeta, DocumentationRoot, TopLevelDescriptor};
