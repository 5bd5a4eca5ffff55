use serde::{Deserialize, Serialize};

/// Base URLs the tile resources are fetched from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    /// Base for tiled sprite images.
    pub images: String,
    /// Base for per-tile metadata.
    pub metadata: String,
}

impl Endpoints {
    pub const SECURE_IMAGES: &'static str = "https://sslimgs.xkcd.com";
    pub const PLAIN_IMAGES: &'static str = "http://imgs.xkcd.com";
    pub const SECURE_METADATA: &'static str = "https://c.xkcd.com/turtle";
    pub const PLAIN_METADATA: &'static str = "http://c.xkcd.com/turtle";

    /// Default endpoints for a secure or plain transport.
    pub fn for_transport(secure: bool) -> Self {
        if secure {
            Self {
                images: Self::SECURE_IMAGES.to_string(),
                metadata: Self::SECURE_METADATA.to_string(),
            }
        } else {
            Self {
                images: Self::PLAIN_IMAGES.to_string(),
                metadata: Self::PLAIN_METADATA.to_string(),
            }
        }
    }

    /// `<images>/turtledown/<id>-tiled.png`
    pub fn image_path(&self, id: &str) -> String {
        format!("{}/turtledown/{id}-tiled.png", self.images.trim_end_matches('/'))
    }

    /// `<metadata>/<id>`
    pub fn metadata_url(&self, id: &str) -> String {
        format!("{}/{id}", self.metadata.trim_end_matches('/'))
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::for_transport(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_path_follows_the_tiled_convention() {
        let endpoints = Endpoints::for_transport(false);
        assert_eq!(
            endpoints.image_path("turtles"),
            "http://imgs.xkcd.com/turtledown/turtles-tiled.png"
        );
        assert_eq!(
            Endpoints::for_transport(true).image_path("t1"),
            "https://sslimgs.xkcd.com/turtledown/t1-tiled.png"
        );
    }

    #[test]
    fn trailing_slashes_are_tolerated() {
        let endpoints = Endpoints {
            images: "file:///tiles/".into(),
            metadata: "http://localhost:8000/spec/".into(),
        };
        assert_eq!(endpoints.image_path("a"), "file:///tiles/turtledown/a-tiled.png");
        assert_eq!(endpoints.metadata_url("a"), "http://localhost:8000/spec/a");
    }
}
