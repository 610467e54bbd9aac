//! Image generation batches.
//!
//! One user request fans out into N independent generation calls. Each call
//! fails on its own; the batch only fails when every call does. Successful
//! URLs keep submission order no matter when each call settles.

use crate::error::{Error, Result};
use crate::services::{ImageGenerator, ImageRequest};
use crate::types::{MediaMeta, Message};
use futures::future::join_all;

pub const DEFAULT_STYLE: &str = "default";
pub const DEFAULT_ASPECT_RATIO: &str = "1:1";

/// Prompt prefixes per style key. `default` has none.
pub const STYLE_PREFIXES: &[(&str, &str)] = &[
    ("default", ""),
    ("real", "Photorealistic style: highly detailed, accurate lighting and textures, mimicking a real photograph. Prompt: "),
    ("cartoon", "Classic 2D cartoon style: bold outlines, flat colors, exaggerated features, simple backgrounds. Prompt: "),
    ("3d-cartoon", "Modern 3D cartoon style: Smooth shapes, vibrant colors, Pixar-like aesthetic. Prompt: "),
    ("disney", "Classic Disney animation style: Expressive characters, fairytale aesthetic, often with musical elements, distinct character designs. Prompt: "),
    ("ghibli", "Studio Ghibli style: warm color palettes, soft lighting, detailed backgrounds, painterly aesthetic, expressive characters, often with themes of nature and fantasy. Prompt: "),
    ("gombad", "GOMBAD Style: A unique visual art style inspired by Studio Ghibli's warm color palettes and soft lighting, combined with cartoon-like clothes, oversized heads, and highly detailed features. The faces and hair resemble Studio Ghibli characters, while the background is always mysterious and dark. The characters have an expressive, emotional presence, often captured with large, rounded eyes. The clothing is simplistic and flat-colored, reminiscent of traditional 2D cartoons. --style raw --v 6.0 Prompt: "),
    ("simpsons", "The Simpsons animation style: yellow skin, distinctive character designs, bright colors, suburban setting. Prompt: "),
    ("muppet", "Muppet style: characters made of felt, foam, and fabric, distinct textures, googly eyes, exaggerated features, often in a playful or chaotic setting. Prompt: "),
    ("minecraft", "Minecraft video game style: blocky, pixelated aesthetic, voxel art, vibrant colors, featuring game elements like blocks, mobs, and environments. Prompt: "),
    ("zombie", "Zombie apocalypse style: decaying flesh, tattered clothing, vacant or menacing expressions, often in desolate or ruined environments, horror aesthetic. Prompt: "),
    ("concept-art", "Concept art style: painterly, focus on mood and atmosphere, often depicting fantastical or sci-fi scenes, character designs, or environments. Prompt: "),
    ("epic", "Epic fantasy style: Dramatic lighting, detailed armor/costumes, fantastical creatures or landscapes, high level of detail. Prompt: "),
    ("gta", "Grand Theft Auto video game style: Realistic yet slightly stylized, modern urban environments, action-oriented poses. Prompt: "),
];

/// The prefix for a style key; unknown keys get none.
pub fn style_prefix(style: &str) -> &'static str {
    STYLE_PREFIXES
        .iter()
        .find(|(key, _)| *key == style)
        .map(|(_, prefix)| *prefix)
        .unwrap_or("")
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// A validated generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageJob {
    pub prompt: String,
    pub style: String,
    pub aspect_ratio: String,
}

impl ImageJob {
    pub fn new(prompt: &str, style: Option<&str>, aspect_ratio: Option<&str>) -> Result<Self> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(Error::Validation(
                "Please provide a description for the image.".to_string(),
            ));
        }
        Ok(Self {
            prompt: prompt.to_string(),
            style: non_empty(style).unwrap_or(DEFAULT_STYLE).to_string(),
            aspect_ratio: non_empty(aspect_ratio)
                .unwrap_or(DEFAULT_ASPECT_RATIO)
                .to_string(),
        })
    }

    pub fn full_prompt(&self) -> String {
        format!("{}{}", style_prefix(&self.style), self.prompt)
    }

    /// User-visible description of the request.
    pub fn describe(&self, count: usize) -> String {
        format!(
            "Generate {count} images (Style: {}, Aspect Ratio: {}): {}",
            self.style, self.aspect_ratio, self.prompt
        )
    }

    /// The history entry recording the request. It is never sent as context.
    pub fn request(&self, count: usize) -> Message {
        Message::image_request(self.describe(count), self.meta())
    }

    fn meta(&self) -> MediaMeta {
        MediaMeta {
            style: Some(self.style.clone()),
            prompt: Some(self.prompt.clone()),
            aspect_ratio: Some(self.aspect_ratio.clone()),
        }
    }

    pub fn generating_notice(&self, count: usize) -> String {
        if self.style == DEFAULT_STYLE {
            format!("Generating {count} images...")
        } else {
            format!("Generating {count} {} style images...", self.style)
        }
    }

    fn requests(&self, count: usize) -> Vec<ImageRequest> {
        let prompt = self.full_prompt();
        (0..count)
            .map(|variant| ImageRequest {
                prompt: prompt.clone(),
                aspect_ratio: self.aspect_ratio.clone(),
                variant,
            })
            .collect()
    }

    /// The aggregate history entry for a batch with at least one image.
    pub fn gallery(&self, urls: Vec<String>) -> Message {
        let n = urls.len();
        let content = format!(
            "[Generated {n} image{} (Style: {}, Ratio: {}) for prompt: \"{}\"]",
            if n == 1 { "" } else { "s" },
            self.style,
            self.aspect_ratio,
            self.prompt
        );
        Message::gallery(content, self.meta(), urls)
    }
}

/// How a batch settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// At least one image; `urls` in submission order
    Completed {
        urls: Vec<String>,
        failed: usize,
        requested: usize,
    },
    /// Every call failed
    AllFailed { requested: usize },
}

impl BatchOutcome {
    /// Transient notice for a partially failed batch.
    pub fn partial_failure_notice(&self) -> Option<String> {
        match self {
            BatchOutcome::Completed {
                failed, requested, ..
            } if *failed > 0 => Some(format!(
                "Note: {failed} out of {requested} image generations failed."
            )),
            _ => None,
        }
    }
}

/// Issue `count` generation calls concurrently and wait for all of them.
pub async fn run_batch(generator: &dyn ImageGenerator, job: &ImageJob, count: usize) -> BatchOutcome {
    let requests = job.requests(count);
    let results = join_all(requests.iter().map(|r| generator.generate(r))).await;

    let urls: Vec<String> = results
        .into_iter()
        .enumerate()
        .filter_map(|(i, result)| match result {
            Ok(image) if !image.url.is_empty() => Some(image.url),
            Ok(_) => {
                tracing::warn!(variant = i, "Image generation returned no URL");
                None
            }
            Err(e) => {
                tracing::warn!(variant = i, error = %e, "Image generation failed");
                None
            }
        })
        .collect();

    if urls.is_empty() {
        tracing::error!(requested = count, "All image generation attempts failed");
        return BatchOutcome::AllFailed { requested: count };
    }
    let failed = count - urls.len();
    tracing::info!(requested = count, succeeded = urls.len(), failed, "Image batch settled");
    BatchOutcome::Completed {
        urls,
        failed,
        requested: count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::GeneratedImage;
    use crate::types::MessageKind;
    use async_trait::async_trait;
    use std::time::Duration;

    /// Fails the listed variants; earlier variants settle last.
    struct Flaky {
        failing: Vec<usize>,
    }

    #[async_trait]
    impl ImageGenerator for Flaky {
        async fn generate(&self, request: &ImageRequest) -> Result<GeneratedImage> {
            tokio::time::sleep(Duration::from_millis(20 - 5 * request.variant as u64)).await;
            if self.failing.contains(&request.variant) {
                Err(Error::service("image", "content policy"))
            } else {
                Ok(GeneratedImage {
                    url: format!("https://img/{}", request.variant + 1),
                })
            }
        }
    }

    #[test]
    fn job_defaults_and_prefixes() {
        let job = ImageJob::new("  a cat  ", None, Some("")).unwrap();
        assert_eq!(job.style, "default");
        assert_eq!(job.aspect_ratio, "1:1");
        assert_eq!(job.full_prompt(), "a cat");

        let ghibli = ImageJob::new("a cat", Some("ghibli"), Some("16:9")).unwrap();
        assert!(ghibli.full_prompt().starts_with("Studio Ghibli style:"));
        assert!(ghibli.full_prompt().ends_with("Prompt: a cat"));
        assert_eq!(
            ghibli.describe(4),
            "Generate 4 images (Style: ghibli, Aspect Ratio: 16:9): a cat"
        );
        assert_eq!(ghibli.generating_notice(4), "Generating 4 ghibli style images...");

        assert_eq!(style_prefix("no-such-style"), "");
        assert!(matches!(ImageJob::new(" ", None, None), Err(Error::Validation(_))));
    }

    #[test]
    fn request_entry_carries_job_settings() {
        let job = ImageJob::new("a cat", Some("ghibli"), Some("16:9")).unwrap();
        let entry = job.request(2);
        assert!(entry.is_image_request());
        assert_eq!(entry.content, job.describe(2));
        match &entry.kind {
            MessageKind::ImageRequest { meta } => {
                assert_eq!(meta.style.as_deref(), Some("ghibli"));
                assert_eq!(meta.aspect_ratio.as_deref(), Some("16:9"));
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn gallery_summary_pluralizes() {
        let job = ImageJob::new("a cat", Some("real"), None).unwrap();
        let one = job.gallery(vec!["u1".into()]);
        assert_eq!(
            one.content,
            "[Generated 1 image (Style: real, Ratio: 1:1) for prompt: \"a cat\"]"
        );
        let meta = one.media().unwrap();
        assert_eq!(meta.prompt.as_deref(), Some("a cat"));
        assert!(job.gallery(vec!["a".into(), "b".into()]).content.starts_with("[Generated 2 images"));
    }

    #[tokio::test]
    async fn partial_failure_keeps_submission_order() {
        let job = ImageJob::new("a cat", None, None).unwrap();
        let outcome = run_batch(&Flaky { failing: vec![1, 2] }, &job, 4).await;

        assert_eq!(
            outcome,
            BatchOutcome::Completed {
                urls: vec!["https://img/1".into(), "https://img/4".into()],
                failed: 2,
                requested: 4,
            }
        );
        assert_eq!(
            outcome.partial_failure_notice().as_deref(),
            Some("Note: 2 out of 4 image generations failed.")
        );
    }

    #[tokio::test]
    async fn total_failure() {
        let job = ImageJob::new("a cat", None, None).unwrap();
        let outcome = run_batch(&Flaky { failing: vec![0, 1, 2, 3] }, &job, 4).await;
        assert_eq!(outcome, BatchOutcome::AllFailed { requested: 4 });
        assert!(outcome.partial_failure_notice().is_none());
    }
}
