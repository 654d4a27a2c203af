//! Slide template catalog and the requirement-to-template matcher.

pub mod catalog;
pub mod matcher;

pub use catalog::{
    CATALOG, CATALOG_SIZE, SlideTemplate, SlotKind, SlotSpec, TemplateKind, all_templates,
};
pub use matcher::{TemplateAssignment, TemplateMatcher, TemplateSelection};
