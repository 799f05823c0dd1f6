//! Duplicate and near-duplicate detection over a batch of posts.
//!
//! Two passes: an O(n) exact pass over normalized text and reshare targets,
//! then an O(n²) similarity pass (batch-local TF-IDF + pairwise cosine) over
//! whatever the exact pass left unclaimed.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use pulsefeed_common::text::collapse_whitespace;
use pulsefeed_common::{DedupKind, DuplicateGroup, Post, RefKind};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));
static MENTION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@\w+").expect("valid regex"));

/// Exact duplicates: identical normalized text, or reshares of the same
/// target (joined with the original when it is in the batch). Singleton
/// groups are discarded. Representative = earliest member.
pub fn detect_exact(posts: &[Post]) -> Vec<DuplicateGroup> {
    let mut uf = UnionFind::new(posts.len());

    let index_by_id: HashMap<&str, usize> = posts
        .iter()
        .enumerate()
        .map(|(i, p)| (p.id.as_str(), i))
        .collect();

    let mut first_by_text: HashMap<String, usize> = HashMap::new();
    let mut first_by_reshare: HashMap<&str, usize> = HashMap::new();

    for (i, post) in posts.iter().enumerate() {
        let normalized = collapse_whitespace(&post.text);
        if !normalized.is_empty() {
            match first_by_text.get(&normalized).copied() {
                Some(j) => uf.union(i, j),
                None => {
                    first_by_text.insert(normalized, i);
                }
            }
        }

        if let Some(reference) = &post.reference {
            if reference.kind == RefKind::Reshared {
                let target = reference.target_id.as_str();
                match first_by_reshare.get(target).copied() {
                    Some(j) => uf.union(i, j),
                    None => {
                        first_by_reshare.insert(target, i);
                    }
                }
                // A reshare group folds in its original when present.
                if let Some(&orig) = index_by_id.get(target) {
                    uf.union(i, orig);
                }
            }
        }
    }

    components(&mut uf, posts.len())
        .into_values()
        .filter(|members| members.len() > 1)
        .map(|members| build_group(posts, members, DedupKind::Exact, None))
        .collect()
}

/// Near-duplicates by lexical similarity. Text is preprocessed (URLs and
/// mentions stripped, whitespace collapsed, lowercased), vectorized with
/// TF-IDF over the batch, and pairs at or above the threshold are unioned
/// into connected groups; candidate groups sharing a member merge
/// transitively. Posts whose preprocessed text is empty are not compared.
pub fn detect_similar(posts: &[Post], threshold: f64) -> Vec<DuplicateGroup> {
    if posts.len() < 2 {
        return Vec::new();
    }

    let docs: Vec<Vec<String>> = posts
        .iter()
        .map(|p| tokenize(&preprocess(&p.text)))
        .collect();

    let candidates: Vec<usize> = (0..posts.len()).filter(|&i| !docs[i].is_empty()).collect();
    if candidates.len() < 2 {
        return Vec::new();
    }

    let vectors = tfidf_vectors(&docs, &candidates);

    let mut uf = UnionFind::new(posts.len());
    let mut edges: Vec<(usize, usize, f64)> = Vec::new();

    for (a, &i) in candidates.iter().enumerate() {
        for &j in candidates.iter().skip(a + 1) {
            let sim = cosine_similarity(&vectors[&i], &vectors[&j]);
            if sim >= threshold {
                uf.union(i, j);
                edges.push((i, j, sim));
            }
        }
    }

    let comps = components(&mut uf, posts.len());

    // Mean of the qualifying pair scores that formed each component.
    let mut score_sum: HashMap<usize, (f64, usize)> = HashMap::new();
    for (i, _, sim) in &edges {
        let root = uf.find(*i);
        let entry = score_sum.entry(root).or_insert((0.0, 0));
        entry.0 += sim;
        entry.1 += 1;
    }

    comps
        .into_iter()
        .filter(|(_, members)| members.len() > 1)
        .map(|(root, members)| {
            let score = score_sum
                .get(&root)
                .map(|(sum, n)| sum / *n as f64)
                .unwrap_or(threshold);
            build_group(posts, members, DedupKind::Similar, Some(score))
        })
        .collect()
}

/// Ids claimed by a set of groups; used to compute the residue for the
/// similarity pass.
pub fn claimed_ids(groups: &[DuplicateGroup]) -> HashSet<String> {
    groups
        .iter()
        .flat_map(|g| g.member_ids.iter().cloned())
        .collect()
}

fn build_group(
    posts: &[Post],
    mut members: Vec<usize>,
    kind: DedupKind,
    similarity: Option<f64>,
) -> DuplicateGroup {
    // Earliest creation wins; equal timestamps break toward the smaller id
    // so detection stays deterministic.
    members.sort_by(|&a, &b| {
        posts[a]
            .created_at
            .cmp(&posts[b].created_at)
            .then_with(|| posts[a].id.cmp(&posts[b].id))
    });

    DuplicateGroup {
        id: Uuid::new_v4(),
        representative_id: posts[members[0]].id.clone(),
        kind,
        similarity,
        member_ids: members.iter().map(|&i| posts[i].id.clone()).collect(),
    }
}

fn preprocess(text: &str) -> String {
    let no_urls = URL_RE.replace_all(text, " ");
    let no_mentions = MENTION_RE.replace_all(&no_urls, " ");
    collapse_whitespace(&no_mentions).to_lowercase()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(|t| t.to_string()).collect()
}

/// TF-IDF over the candidate documents only. Smoothed IDF keeps weights
/// positive even for terms present in every document.
fn tfidf_vectors(
    docs: &[Vec<String>],
    candidates: &[usize],
) -> HashMap<usize, HashMap<String, f64>> {
    let n = candidates.len() as f64;

    let mut df: HashMap<&str, usize> = HashMap::new();
    for &i in candidates {
        let unique: HashSet<&str> = docs[i].iter().map(|t| t.as_str()).collect();
        for term in unique {
            *df.entry(term).or_insert(0) += 1;
        }
    }

    candidates
        .iter()
        .map(|&i| {
            let mut tf: HashMap<&str, usize> = HashMap::new();
            for term in &docs[i] {
                *tf.entry(term.as_str()).or_insert(0) += 1;
            }
            let vector = tf
                .into_iter()
                .map(|(term, count)| {
                    let idf = (n / (1.0 + df[term] as f64)).ln() + 1.0;
                    (term.to_string(), count as f64 * idf)
                })
                .collect();
            (i, vector)
        })
        .collect()
}

fn cosine_similarity(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(term, w)| b.get(term).map(|v| w * v))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, i: usize) -> usize {
        if self.parent[i] != i {
            let root = self.find(self.parent[i]);
            self.parent[i] = root;
        }
        self.parent[i]
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

fn components(uf: &mut UnionFind, n: usize) -> HashMap<usize, Vec<usize>> {
    let mut comps: HashMap<usize, Vec<usize>> = HashMap::new();
    for i in 0..n {
        comps.entry(uf.find(i)).or_default().push(i);
    }
    comps
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn post_at(id: &str, text: &str, hour: u32) -> Post {
        Post {
            id: id.to_string(),
            text: text.to_string(),
            author_handle: "acct".to_string(),
            author_name: "Account".to_string(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, hour, 0, 0).unwrap(),
            reference: None,
            media: Vec::new(),
        }
    }

    fn reshare_at(id: &str, target: &str, hour: u32) -> Post {
        let mut p = post_at(id, &format!("RT content of {target}"), hour);
        p.reference = Some(pulsefeed_common::PostRef {
            target_id: target.to_string(),
            kind: RefKind::Reshared,
            text: None,
            author_handle: None,
            media: Vec::new(),
        });
        p
    }

    // --- exact pass ---

    #[test]
    fn three_identical_texts_form_one_group() {
        let posts = vec![
            post_at("b", "same   text here", 2),
            post_at("a", "same text  here", 1),
            post_at("c", "same text here", 3),
        ];
        let groups = detect_exact(&posts);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids.len(), 3);
        assert_eq!(groups[0].representative_id, "a");
        assert_eq!(groups[0].kind, DedupKind::Exact);
        assert!(groups[0].similarity.is_none());
    }

    #[test]
    fn unique_texts_form_no_groups() {
        let posts = vec![
            post_at("a", "first", 1),
            post_at("b", "second", 2),
            post_at("c", "third", 3),
        ];
        assert!(detect_exact(&posts).is_empty());
    }

    #[test]
    fn reshares_of_same_target_group_with_original() {
        let posts = vec![
            post_at("orig", "the announcement", 1),
            reshare_at("r1", "orig", 2),
            reshare_at("r2", "orig", 3),
        ];
        let groups = detect_exact(&posts);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids.len(), 3);
        assert_eq!(groups[0].representative_id, "orig");
    }

    #[test]
    fn reshares_group_without_original_in_batch() {
        let posts = vec![
            reshare_at("r1", "elsewhere", 1),
            reshare_at("r2", "elsewhere", 2),
            post_at("x", "unrelated", 3),
        ];
        let groups = detect_exact(&posts);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids, vec!["r1", "r2"]);
    }

    #[test]
    fn representative_tie_breaks_on_id() {
        let posts = vec![
            post_at("z", "dup", 1),
            post_at("a", "dup", 1),
        ];
        let groups = detect_exact(&posts);
        assert_eq!(groups[0].representative_id, "a");
    }

    // --- similarity pass ---

    #[test]
    fn url_and_mention_noise_does_not_separate_posts() {
        let posts = vec![
            post_at("a", "big launch day for the team https://short.ly/abc", 1),
            post_at("b", "big launch day for the team https://short.ly/xyz @alice", 2),
            post_at("c", "completely different topic entirely", 3),
        ];
        let groups = detect_similar(&posts, 0.85);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids, vec!["a", "b"]);
        assert_eq!(groups[0].kind, DedupKind::Similar);
        let score = groups[0].similarity.unwrap();
        assert!(score > 0.99, "identical after preprocessing, got {score}");
    }

    #[test]
    fn groups_sharing_a_member_merge() {
        let posts = vec![
            post_at("a", "quarterly results exceeded expectations https://a.co", 1),
            post_at("b", "quarterly results exceeded expectations https://b.co", 2),
            post_at("c", "quarterly results exceeded expectations @press", 3),
        ];
        let groups = detect_similar(&posts, 0.85);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_ids.len(), 3);
    }

    #[test]
    fn dissimilar_posts_stay_apart() {
        let posts = vec![
            post_at("a", "weather looks great today", 1),
            post_at("b", "server maintenance window tonight", 2),
        ];
        assert!(detect_similar(&posts, 0.85).is_empty());
    }

    #[test]
    fn empty_after_preprocessing_is_not_compared() {
        let posts = vec![
            post_at("a", "https://only.a/url @mention", 1),
            post_at("b", "https://only.b/url", 2),
            post_at("c", "real words here", 3),
        ];
        assert!(detect_similar(&posts, 0.85).is_empty());
    }

    #[test]
    fn single_post_batch_yields_nothing() {
        let posts = vec![post_at("a", "alone", 1)];
        assert!(detect_similar(&posts, 0.85).is_empty());
        assert!(detect_exact(&posts).is_empty());
    }

    #[test]
    fn union_find_chains_transitively() {
        let mut uf = UnionFind::new(4);
        uf.union(0, 1);
        uf.union(1, 2);
        assert_eq!(uf.find(0), uf.find(2));
        assert_ne!(uf.find(0), uf.find(3));
    }

    // --- residue interaction ---

    #[test]
    fn exact_pass_leaves_residue_for_similarity() {
        let posts = vec![
            post_at("a", "identical pair", 1),
            post_at("b", "identical pair", 2),
            post_at("c", "something else", 3),
            post_at("d", "another thing", 4),
        ];
        let exact = detect_exact(&posts);
        assert_eq!(exact.len(), 1);
        assert_eq!(exact[0].member_ids.len(), 2);

        let claimed = claimed_ids(&exact);
        let residue: Vec<Post> = posts
            .iter()
            .filter(|p| !claimed.contains(&p.id))
            .cloned()
            .collect();
        assert_eq!(residue.len(), 2);
    }
}
