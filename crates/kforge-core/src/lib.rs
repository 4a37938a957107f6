//! kforge Core - Builder pipeline for programmatic Kubernetes manifests
//!
//! This crate provides:
//! - `Document`: one manifest object with path-based access to its fields
//! - `Component`: named, dependency-aware units that emit documents
//! - `Builder`: the registry that executes components and post-processes
//!   their output (CRD collection, namespace synthesis, canonical field order)
//! - `DocumentGraph`: apply ordering across documents
//! - `ClusterContext`: target cluster identity handed to components

pub mod builder;
pub mod canonical;
pub mod category;
pub mod collector;
pub mod component;
pub mod context;
pub mod document;
pub mod error;
pub mod kinds;
pub mod manifest;
pub mod meta;
pub mod path;
pub mod resolver;
pub mod set;
pub mod stage;

pub use builder::{BuildOptions, BuildOutput, Builder};
pub use category::ResourceCategory;
pub use component::{BuildContext, Component, FnComponent, ManifestComponent};
pub use context::{ClusterContext, EnvironmentType};
pub use document::{CrdRef, Document, DocumentKey, Markers};
pub use error::{CoreError, ErrorKind, Result};
pub use meta::{Annotatable, Labelable};
pub use path::PropertyPath;
pub use resolver::{DEPENDS_ON_ANNOTATION, DocumentGraph};
pub use set::DocumentSet;
pub use stage::{CanonicalStage, CrdStage, NamespaceStage, Stage};
