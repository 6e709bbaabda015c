//! Paginated web image search used to top up a game's screenshot list.

use std::time::Duration;

use crate::selection::Candidate;

/// A source of extra candidate images for a game name. Pages start at 1; an
/// empty page means there is nothing more.
pub trait ImageSearch: Send + Sync {
    fn search(&self, query: &str, page: u32) -> anyhow::Result<Vec<Candidate>>;
}

/// Canned results for a couple of well-known titles, returned after a short
/// artificial delay. Stands in for a real search API until a key is wired up.
pub struct MockImageSearch {
    delay: Duration,
    api_key: Option<String>,
}

impl MockImageSearch {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            api_key: std::env::var("API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

fn placeholder(id: &str, thumb: &str, full: &str) -> Candidate {
    Candidate::new(
        id,
        format!("https://via.placeholder.com/150/{thumb}"),
        format!("https://via.placeholder.com/600x400/{full}"),
    )
}

impl ImageSearch for MockImageSearch {
    fn search(&self, query: &str, page: u32) -> anyhow::Result<Vec<Candidate>> {
        tracing::info!(
            "web image search for '{query}' page {page} (mock, API key {})",
            if self.has_api_key() { "set" } else { "not set" }
        );
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let query = query.to_lowercase();
        let results = if query.contains("minecraft") {
            match page {
                1 => vec![
                    placeholder(
                        "mc_web_1_1",
                        "00FF00/FFFFFF?Text=Minecraft+Web+P1T1",
                        "00FF00/FFFFFF?Text=Minecraft+Web+P1I1",
                    ),
                    placeholder(
                        "mc_web_1_2",
                        "00CC00/FFFFFF?Text=Minecraft+Web+P1T2",
                        "00CC00/FFFFFF?Text=Minecraft+Web+P1I2",
                    ),
                ],
                2 => vec![placeholder(
                    "mc_web_2_1",
                    "009900/FFFFFF?Text=Minecraft+Web+P2T1",
                    "009900/FFFFFF?Text=Minecraft+Web+P2I1",
                )],
                _ => Vec::new(),
            }
        } else if query.contains("elden ring") && page == 1 {
            vec![placeholder(
                "er_web_1_1",
                "FFFF00/000000?Text=Elden+Web+P1T1",
                "FFFF00/000000?Text=Elden+Ring+Web+P1I1",
            )]
        } else {
            Vec::new()
        };
        tracing::debug!("web image search returned {} result(s)", results.len());
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn search() -> MockImageSearch {
        MockImageSearch::new(Duration::ZERO)
    }

    #[test]
    fn minecraft_has_two_pages() {
        let s = search();
        assert_eq!(s.search("Minecraft Dungeons", 1).unwrap().len(), 2);
        assert_eq!(s.search("MINECRAFT", 2).unwrap()[0].id, "mc_web_2_1");
        assert!(s.search("minecraft", 3).unwrap().is_empty());
    }

    #[test]
    fn elden_ring_has_one_page() {
        let s = search();
        let first = s.search("Elden Ring", 1).unwrap();
        assert_eq!(first.len(), 1);
        assert!(first[0].full_url.contains("Elden+Ring"));
        assert!(s.search("Elden Ring", 2).unwrap().is_empty());
    }

    #[test]
    fn unknown_titles_find_nothing() {
        assert!(search().search("Portal 2", 1).unwrap().is_empty());
    }
}
