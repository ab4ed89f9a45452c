pub mod resume;
pub mod style;

pub use resume::{ListStyle, Node, ResumeContent};
pub use style::StyleRules;
