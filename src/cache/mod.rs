//! Semantic Redaction Cache (spec.md #4.J): two LRU tiers (exact document
//! hash, structural template) sharing a memory budget, policy-partitioned.

pub mod entry;
mod lru;

use crate::document::Document;
use crate::span::{Span, SpanFactory, SpanOptions};
use crate::structure::{DocumentStructure, StructureExtractor};
use crate::template_mapper::TemplateSpanMapper;
use entry::{to_cached_span, CachedRedactionResult, CachedSpan};
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

pub const DEFAULT_MAX_EXACT_ENTRIES: usize = 500;
pub const DEFAULT_MAX_STRUCTURE_ENTRIES: usize = 500;
pub const DEFAULT_MAX_MEMORY_BYTES: usize = 500 * 1024 * 1024;
pub const EXACT_TIER_MEMORY_SHARE: f64 = 0.7;
pub const STRUCTURE_TIER_MEMORY_SHARE: f64 = 0.3;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 3600);
pub const DEFAULT_MIN_STRUCTURE_SIMILARITY: f64 = 0.8;
const STRUCTURE_BUCKET_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitType {
    Exact,
    Structure,
}

pub struct CacheHit {
    pub spans: Vec<Span>,
    pub hit_type: HitType,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Tier {
    Exact,
    Structure,
}

#[derive(Default)]
struct PrecisionMetrics {
    validated: u64,
    correct: u64,
}

pub struct CacheConfig {
    pub max_exact_entries: usize,
    pub max_structure_entries: usize,
    pub max_memory_bytes: usize,
    pub ttl: Duration,
    pub min_structure_similarity: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_exact_entries: DEFAULT_MAX_EXACT_ENTRIES,
            max_structure_entries: DEFAULT_MAX_STRUCTURE_ENTRIES,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            ttl: DEFAULT_TTL,
            min_structure_similarity: DEFAULT_MIN_STRUCTURE_SIMILARITY,
        }
    }
}

/// Guards both LRU tiers and the reverse policy index under one mutex;
/// hashing and structure extraction happen outside the lock (spec.md #5).
pub struct SemanticRedactionCache {
    exact: std::sync::Mutex<LruCache<String, CachedRedactionResult>>,
    structure: std::sync::Mutex<LruCache<String, Vec<CachedRedactionResult>>>,
    reverse_index: std::sync::Mutex<HashMap<String, HashSet<(String, Tier)>>>,
    mapper: TemplateSpanMapper,
    min_structure_similarity: f64,
    precision: std::sync::Mutex<PrecisionMetrics>,
}

impl SemanticRedactionCache {
    pub fn new(config: CacheConfig) -> Self {
        let exact_memory = (config.max_memory_bytes as f64 * EXACT_TIER_MEMORY_SHARE) as usize;
        let structure_memory = (config.max_memory_bytes as f64 * STRUCTURE_TIER_MEMORY_SHARE) as usize;
        Self {
            exact: std::sync::Mutex::new(LruCache::new(config.max_exact_entries, exact_memory, config.ttl)),
            structure: std::sync::Mutex::new(LruCache::new(
                config.max_structure_entries,
                structure_memory,
                config.ttl,
            )),
            reverse_index: std::sync::Mutex::new(HashMap::new()),
            mapper: TemplateSpanMapper::default(),
            min_structure_similarity: config.min_structure_similarity,
            precision: std::sync::Mutex::new(PrecisionMetrics::default()),
        }
    }

    pub fn lookup(&self, document: &Document, policy_hash: &str) -> Option<CacheHit> {
        let doc_hash = sha256_hex(document.text());
        let exact_key = format!("{doc_hash}:{policy_hash}");

        if let Some(cached) = self.exact.lock().unwrap().get_mut(&exact_key) {
            cached.hit_count += 1;
            let spans = reconstruct_exact(document, cached);
            return Some(CacheHit {
                spans,
                hit_type: HitType::Exact,
                confidence: 1.0,
            });
        }

        let new_structure = StructureExtractor::extract(document);
        let structure_key = format!("{}:{}", new_structure.hash, policy_hash);

        {
            let mut structure_tier = self.structure.lock().unwrap();
            if let Some(bucket) = structure_tier.get_mut(&structure_key) {
                if let Some(best) = bucket.iter_mut().max_by_key(|r| r.hit_count) {
                    best.hit_count += 1;
                    let outcome = self.mapper.map(document, best);
                    if outcome.reliable {
                        return Some(CacheHit {
                            spans: outcome.spans,
                            hit_type: HitType::Structure,
                            confidence: outcome.overall_confidence,
                        });
                    }
                }
            }
        }

        self.scan_for_similar_structure(document, &new_structure, policy_hash)
    }

    fn scan_for_similar_structure(
        &self,
        document: &Document,
        new_structure: &DocumentStructure,
        policy_hash: &str,
    ) -> Option<CacheHit> {
        let best_location = {
            let structure_tier = self.structure.lock().unwrap();
            let mut best: Option<(String, usize, f64)> = None;
            for key in structure_tier.keys() {
                if !key.ends_with(&format!(":{policy_hash}")) {
                    continue;
                }
                if let Some(bucket) = structure_tier.peek(key) {
                    for (index, candidate) in bucket.iter().enumerate() {
                        let similarity = StructureExtractor::similarity(&candidate.structure, new_structure);
                        if similarity >= self.min_structure_similarity {
                            let better = best.as_ref().map(|(_, _, s)| similarity > *s).unwrap_or(true);
                            if better {
                                best = Some((key.clone(), index, similarity));
                            }
                        }
                    }
                }
            }
            best
        };

        let (structure_key, index, _) = best_location?;
        let mut structure_tier = self.structure.lock().unwrap();
        let bucket = structure_tier.get_mut(&structure_key)?;
        let candidate = bucket.get_mut(index)?;
        candidate.hit_count += 1;
        let outcome = self.mapper.map(document, candidate);
        drop(structure_tier);
        if outcome.reliable {
            Some(CacheHit {
                spans: outcome.spans,
                hit_type: HitType::Structure,
                confidence: outcome.overall_confidence,
            })
        } else {
            None
        }
    }

    pub fn store(&self, document: &Document, spans: &[Span], structure: &DocumentStructure, policy_hash: &str) {
        let doc_hash = sha256_hex(document.text());
        let exact_key = format!("{doc_hash}:{policy_hash}");
        let structure_key = format!("{}:{}", structure.hash, policy_hash);

        let cached_spans: Vec<CachedSpan> = spans.iter().map(|s| to_cached_span(s, structure)).collect();
        let memory_estimate = estimate_memory(structure, &cached_spans);

        let result = CachedRedactionResult {
            structure: structure.clone(),
            spans: cached_spans,
            policy_hash: policy_hash.to_string(),
            timestamp: now_unix(),
            hit_count: 0,
        };

        self.exact.lock().unwrap().put(exact_key.clone(), result.clone(), memory_estimate);

        {
            let mut structure_tier = self.structure.lock().unwrap();
            let mut bucket = structure_tier.remove(&structure_key).unwrap_or_default();
            bucket.push(result);
            if bucket.len() > STRUCTURE_BUCKET_CAP {
                bucket.remove(0);
            }
            let bucket_memory = memory_estimate * bucket.len();
            structure_tier.put(structure_key.clone(), bucket, bucket_memory);
        }

        let mut reverse_index = self.reverse_index.lock().unwrap();
        let keys = reverse_index.entry(policy_hash.to_string()).or_default();
        keys.insert((exact_key, Tier::Exact));
        keys.insert((structure_key, Tier::Structure));
    }

    pub fn invalidate_policy(&self, policy_hash: &str) {
        let mut reverse_index = self.reverse_index.lock().unwrap();
        if let Some(keys) = reverse_index.remove(policy_hash) {
            let mut exact = self.exact.lock().unwrap();
            let mut structure = self.structure.lock().unwrap();
            for (key, tier) in keys {
                match tier {
                    Tier::Exact => {
                        exact.remove(&key);
                    }
                    Tier::Structure => {
                        structure.remove(&key);
                    }
                }
            }
        }
    }

    /// Extracts structure and stores each pre-labeled document; returns the
    /// number of successful stores.
    pub fn prewarm(&self, docs: &[(Document, Vec<Span>)], policy_hash: &str) -> usize {
        let mut successes = 0;
        for (document, spans) in docs {
            let structure = StructureExtractor::extract(document);
            self.store(document, spans, &structure, policy_hash);
            successes += 1;
        }
        successes
    }

    pub fn record_hit_validation(&self, was_correct: bool) {
        let mut precision = self.precision.lock().unwrap();
        precision.validated += 1;
        if was_correct {
            precision.correct += 1;
        }
    }

    pub fn precision(&self) -> Option<f64> {
        let precision = self.precision.lock().unwrap();
        if precision.validated == 0 {
            None
        } else {
            Some(precision.correct as f64 / precision.validated as f64)
        }
    }
}

/// Positions are identical for an exact hit, so spans are reconstructed from
/// the stored field offsets without any mapping penalty.
fn reconstruct_exact(document: &Document, cached: &CachedRedactionResult) -> Vec<Span> {
    let mut spans = Vec::with_capacity(cached.spans.len());
    for cached_span in &cached.spans {
        let start = if cached_span.is_standalone() {
            cached_span.offset_from_field_start
        } else {
            let field_index = cached_span.field_index as usize;
            match cached.structure.fields.get(field_index) {
                Some(field) => field.value_start + cached_span.offset_from_field_start,
                None => continue,
            }
        };
        let end = start + cached_span.length;
        if end > document.len() {
            continue;
        }
        if let Ok(span) = SpanFactory::from_position(
            document,
            start,
            end,
            cached_span.filter_type,
            cached_span.confidence,
            SpanOptions {
                priority: cached_span.priority,
                pattern: cached_span.pattern.clone(),
                detector_id: Some("cache:exact".into()),
            },
        ) {
            spans.push(span);
        }
    }
    spans
}

fn estimate_memory(structure: &DocumentStructure, spans: &[CachedSpan]) -> usize {
    let base = 2 * structure.skeleton.len() + structure.hash.len() + 100 * structure.fields.len();
    let per_span: usize = spans
        .iter()
        .map(|s| 2 * s.original_text.len() + 2 * s.pattern.as_deref().unwrap_or("").len() + 50)
        .sum();
    base + per_span
}

fn sha256_hex(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex::encode(hasher.finalize())
}

fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
