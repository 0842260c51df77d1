//! Local template storage

mod templates;

pub use templates::{TemplateError, TemplateNode, TemplateResult, TemplateStore, TEMPLATE_EXT};
