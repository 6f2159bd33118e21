mod artifact;

pub use artifact::{join_relative, MavenArtifact};
