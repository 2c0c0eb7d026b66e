//! Deduplication and the post-hoc filter chain.
//!
//! Every stage only removes records. A stage whose criterion is unset passes
//! records through untouched. The experience and education stages are
//! fail-open: a record whose field is missing or unparseable is kept, because
//! boards often leave those fields out of their result cards.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::JobListing;

/// Titles longer than this are almost always mis-scraped article bodies.
pub const MAX_TITLE_CHARS: usize = 150;

/// Shortest query token that counts as a keyword.
pub const MIN_KEYWORD_CHARS: usize = 2;

const ENTRY_LEVEL_MARKERS: &[&str] = &["신입", "무관", "entry"];

lazy_static! {
    static ref NUMBER_REGEX: Regex = Regex::new(r"\d+").unwrap();
}

fn is_hangul(c: char) -> bool {
    matches!(c, '\u{AC00}'..='\u{D7A3}' | '\u{1100}'..='\u{11FF}' | '\u{3130}'..='\u{318F}')
}

/// Split a free-text query into lowercase keywords.
///
/// Anything that is not an ASCII letter, digit or Hangul becomes a separator,
/// and tokens shorter than [`MIN_KEYWORD_CHARS`] are dropped.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let cleaned: String = query
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || is_hangul(c) {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut seen = HashSet::new();
    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_KEYWORD_CHARS)
        .map(|t| t.to_lowercase())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

/// First integer in a string, e.g. `"3"`, `"3년"`, `"경력 3년 이상"`.
pub fn parse_years(input: &str) -> Option<u32> {
    NUMBER_REGEX
        .find(input)
        .and_then(|m| m.as_str().parse().ok())
}

/// Education requirement scale, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EducationLevel {
    NoRequirement,
    HighSchool,
    Associate,
    Bachelor,
    Master,
    Doctorate,
}

impl EducationLevel {
    pub const ALL: [EducationLevel; 6] = [
        Self::NoRequirement,
        Self::HighSchool,
        Self::Associate,
        Self::Bachelor,
        Self::Master,
        Self::Doctorate,
    ];

    /// Substrings boards use for this level.
    pub fn markers(self) -> &'static [&'static str] {
        match self {
            Self::NoRequirement => &["학력무관", "학력 무관"],
            Self::HighSchool => &["고졸", "고등학교"],
            Self::Associate => &["초대졸", "전문대", "2,3년제", "2·3년제"],
            Self::Bachelor => &["대졸", "학사", "4년제", "대학교"],
            Self::Master => &["석사", "대학원"],
            Self::Doctorate => &["박사"],
        }
    }

    fn english_names(self) -> &'static [&'static str] {
        match self {
            Self::NoRequirement => &["none", "any", "no-requirement", "no_requirement"],
            Self::HighSchool => &["high-school", "high_school", "highschool"],
            Self::Associate => &["associate", "college"],
            Self::Bachelor => &["bachelor", "university"],
            Self::Master => &["master"],
            Self::Doctorate => &["doctorate", "phd"],
        }
    }

    /// Parse an English name, a 0-5 ordinal, or any Korean marker
    /// (`"대졸"`, `"대졸↑"`, `"초대졸 이상"`).
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }

        let lower = input.to_lowercase();
        if let Some(level) = Self::ALL
            .into_iter()
            .find(|l| l.english_names().contains(&lower.as_str()))
        {
            return Some(level);
        }

        if let Ok(ordinal) = input.parse::<usize>() {
            return Self::ALL.get(ordinal).copied();
        }

        // Longest marker wins so "초대졸" is not read as "대졸"
        let mut markers: Vec<(EducationLevel, &str)> = Self::ALL
            .into_iter()
            .flat_map(|l| l.markers().iter().map(move |m| (l, *m)))
            .collect();
        markers.sort_by_key(|(_, m)| std::cmp::Reverse(m.chars().count()));
        markers
            .into_iter()
            .find(|(_, m)| input.contains(m))
            .map(|(level, _)| level)
    }

    /// Markers of every level up to and including this one.
    pub fn allowed_markers(self) -> Vec<&'static str> {
        Self::ALL
            .into_iter()
            .filter(|l| *l <= self)
            .flat_map(|l| l.markers().iter().copied())
            .collect()
    }
}

/// Per-request filter configuration, immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    pub query_keywords: Vec<String>,
    pub regions: Vec<String>,
    pub max_experience_years: Option<u32>,
    pub max_education: Option<EducationLevel>,
}

impl FilterCriteria {
    pub fn for_query(query: &str) -> Self {
        Self {
            query_keywords: tokenize_query(query),
            ..Default::default()
        }
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        self.regions = regions
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty() && seen.insert(r.clone()))
            .collect();
        self
    }

    pub fn with_max_experience(mut self, years: Option<u32>) -> Self {
        self.max_experience_years = years;
        self
    }

    pub fn with_max_education(mut self, level: Option<EducationLevel>) -> Self {
        self.max_education = level;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.query_keywords.is_empty()
            && self.regions.is_empty()
            && self.max_experience_years.is_none()
            && self.max_education.is_none()
    }
}

/// Keep the first record for each link (or title, when the link is empty).
pub fn dedup(jobs: Vec<JobListing>) -> Vec<JobListing> {
    let mut seen = HashSet::new();
    jobs.into_iter()
        .filter(|job| seen.insert(job.dedup_key()))
        .collect()
}

fn is_relevant(job: &JobListing, keywords: &[String]) -> bool {
    if job.title.chars().count() > MAX_TITLE_CHARS || job.title.contains("http") {
        return false;
    }
    let haystack = format!("{} {}", job.title, job.company).to_lowercase();
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}

fn in_region(job: &JobListing, regions: &[String]) -> bool {
    regions.iter().any(|r| job.location.contains(r.as_str()))
}

fn within_experience(job: &JobListing, max_years: u32) -> bool {
    let experience = job.experience.trim();
    if experience.is_empty() {
        return true;
    }
    let lower = experience.to_lowercase();
    if ENTRY_LEVEL_MARKERS.iter().any(|m| lower.contains(m)) {
        return true;
    }

    let mut numbers = NUMBER_REGEX
        .find_iter(experience)
        .filter_map(|m| m.as_str().parse::<u32>().ok())
        .peekable();
    if numbers.peek().is_none() {
        return true;
    }
    numbers.any(|n| n <= max_years)
}

fn within_education(job: &JobListing, allowed: &[&str]) -> bool {
    let education = job.education.trim();
    education.is_empty() || allowed.iter().any(|m| education.contains(m))
}

/// One stage of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterStage {
    Keyword,
    Region,
    Experience,
    Education,
}

impl FilterStage {
    /// Keyword first: it is the most aggressive cut.
    pub const ORDER: [FilterStage; 4] = [
        Self::Keyword,
        Self::Region,
        Self::Experience,
        Self::Education,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Keyword => "keyword",
            Self::Region => "region",
            Self::Experience => "experience",
            Self::Education => "education",
        }
    }

    /// Run this stage. Unset criteria leave the input unchanged.
    pub fn apply(self, criteria: &FilterCriteria, mut jobs: Vec<JobListing>) -> Vec<JobListing> {
        match self {
            Self::Keyword if !criteria.query_keywords.is_empty() => {
                jobs.retain(|j| is_relevant(j, &criteria.query_keywords));
            }
            Self::Region if !criteria.regions.is_empty() => {
                jobs.retain(|j| in_region(j, &criteria.regions));
            }
            Self::Experience => {
                if let Some(max) = criteria.max_experience_years {
                    jobs.retain(|j| within_experience(j, max));
                }
            }
            Self::Education => {
                if let Some(level) = criteria.max_education {
                    let allowed = level.allowed_markers();
                    jobs.retain(|j| within_education(j, &allowed));
                }
            }
            _ => {}
        }
        jobs
    }
}

/// The fixed, ordered filter chain.
pub struct FilterChain;

impl FilterChain {
    pub fn apply(criteria: &FilterCriteria, jobs: Vec<JobListing>) -> Vec<JobListing> {
        FilterStage::ORDER.into_iter().fold(jobs, |jobs, stage| {
            let before = jobs.len();
            let after = stage.apply(criteria, jobs);
            debug!(
                stage = stage.name(),
                before,
                after = after.len(),
                "Filter stage applied"
            );
            after
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn job(title: &str) -> JobListing {
        JobListing::new("test".into(), title, "ACME")
    }

    fn with_experience(experience: &str) -> JobListing {
        job("개발자").with_experience(experience)
    }

    fn with_education(education: &str) -> JobListing {
        job("개발자").with_education(education)
    }

    #[test]
    fn test_tokenize_query() {
        assert_eq!(tokenize_query("백엔드 개발자"), vec!["백엔드", "개발자"]);
        assert_eq!(tokenize_query("C++/Java, a 개"), vec!["java"]);
        assert_eq!(tokenize_query("Rust rust RUST"), vec!["rust"]);
        assert!(tokenize_query("!! ?").is_empty());
    }

    #[test]
    fn test_keyword_relevance_matches_title_or_company() {
        let criteria = FilterCriteria::for_query("백엔드 개발자");
        let jobs = vec![
            JobListing::new("a".into(), "백엔드 신입 개발자 채용", "ACME"),
            JobListing::new("a".into(), "영업 관리", "백엔드솔루션"),
            JobListing::new("a".into(), "영업 관리", "ACME"),
        ];

        let kept = FilterStage::Keyword.apply(&criteria, jobs);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title, "백엔드 신입 개발자 채용");
        assert_eq!(kept[1].company, "백엔드솔루션");
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let criteria = FilterCriteria::for_query("developer");
        let kept = FilterStage::Keyword.apply(&criteria, vec![job("Senior DEVELOPER")]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_long_title_rejected_even_when_keyword_matches() {
        let criteria = FilterCriteria::for_query("백엔드 개발자");
        let long_title = format!("오늘의 주식 시장 분석 블로그 포스트 백엔드 {}", "가".repeat(160));
        assert!(long_title.chars().count() > MAX_TITLE_CHARS);

        let kept = FilterStage::Keyword.apply(&criteria, vec![job(&long_title)]);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_title_with_http_rejected() {
        let criteria = FilterCriteria::for_query("개발자");
        let kept = FilterStage::Keyword.apply(
            &criteria,
            vec![job("개발자 블로그 https://blog.example.com")],
        );
        assert!(kept.is_empty());
    }

    #[test]
    fn test_no_keywords_is_noop() {
        let criteria = FilterCriteria::for_query("a !");
        let long_title = "x".repeat(200);
        let kept = FilterStage::Keyword.apply(&criteria, vec![job(&long_title)]);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_region_filter() {
        let criteria = FilterCriteria::default().with_regions(["서울"]);
        let jobs = vec![
            job("a").with_location("서울/경기"),
            job("b").with_location("부산"),
        ];

        let kept = FilterStage::Region.apply(&criteria, jobs);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].location, "서울/경기");
    }

    #[test]
    fn test_region_filter_is_or_across_regions() {
        let criteria = FilterCriteria::default().with_regions(["서울", "부산", " "]);
        assert_eq!(criteria.regions, vec!["서울", "부산"]);

        let jobs = vec![
            job("a").with_location("부산 해운대구"),
            job("b").with_location("대전"),
            job("c"),
        ];
        let kept = FilterStage::Region.apply(&criteria, jobs);
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_experience_filter() {
        let criteria = FilterCriteria::default().with_max_experience(Some(3));
        let cases = [
            ("신입", true),
            ("경력무관", true),
            ("2년 이상", true),
            ("5년 이상", false),
            ("", true),
            ("경력 3~5년", true),
            ("경력", true),
            ("신입·경력 7년↑", true),
        ];

        for (experience, expected) in cases {
            let kept = FilterStage::Experience.apply(&criteria, vec![with_experience(experience)]);
            assert_eq!(kept.len() == 1, expected, "experience={:?}", experience);
        }
    }

    #[test]
    fn test_education_filter() {
        let criteria = FilterCriteria::default().with_max_education(Some(EducationLevel::Bachelor));
        let cases = [
            ("대졸", true),
            ("학력무관", true),
            ("석사", false),
            ("박사↑", false),
            ("고졸↑", true),
            ("초대졸↑", true),
            ("", true),
        ];

        for (education, expected) in cases {
            let kept = FilterStage::Education.apply(&criteria, vec![with_education(education)]);
            assert_eq!(kept.len() == 1, expected, "education={:?}", education);
        }
    }

    #[test]
    fn test_education_ceiling_below_bachelor() {
        let criteria = FilterCriteria::default().with_max_education(Some(EducationLevel::Associate));
        let kept = FilterStage::Education.apply(
            &criteria,
            vec![with_education("대졸↑"), with_education("초대졸↑")],
        );
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].education, "초대졸↑");
    }

    #[test]
    fn test_education_level_parse() {
        assert_eq!(EducationLevel::parse("bachelor"), Some(EducationLevel::Bachelor));
        assert_eq!(EducationLevel::parse("대졸"), Some(EducationLevel::Bachelor));
        assert_eq!(EducationLevel::parse("대졸(4년)"), Some(EducationLevel::Bachelor));
        assert_eq!(EducationLevel::parse("초대졸 이상"), Some(EducationLevel::Associate));
        assert_eq!(EducationLevel::parse("학력무관"), Some(EducationLevel::NoRequirement));
        assert_eq!(EducationLevel::parse("4"), Some(EducationLevel::Master));
        assert_eq!(EducationLevel::parse("9"), None);
        assert_eq!(EducationLevel::parse("PhD"), Some(EducationLevel::Doctorate));
        assert_eq!(EducationLevel::parse(""), None);
        assert_eq!(EducationLevel::parse("아무거나"), None);
    }

    #[test]
    fn test_parse_years() {
        assert_eq!(parse_years("3"), Some(3));
        assert_eq!(parse_years("3년"), Some(3));
        assert_eq!(parse_years("경력 10년 이상"), Some(10));
        assert_eq!(parse_years("신입"), None);
    }

    #[test]
    fn test_dedup_by_link_then_title() {
        let jobs = vec![
            job("A").with_link("https://x/1"),
            job("B").with_link("https://x/1"),
            job("C"),
            job("C"),
            job("C").with_link("https://x/2"),
        ];

        let unique = dedup(jobs);

        let titles: Vec<_> = unique.iter().map(|j| j.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "C", "C"]);
        assert_eq!(unique[2].link, "https://x/2");
    }

    #[test]
    fn test_chain_applies_all_stages() {
        let criteria = FilterCriteria::for_query("개발자")
            .with_regions(["서울"])
            .with_max_experience(Some(3))
            .with_max_education(Some(EducationLevel::Bachelor));

        let jobs = vec![
            job("백엔드 개발자").with_location("서울").with_experience("신입").with_education("대졸"),
            job("영업").with_location("서울"),
            job("개발자").with_location("부산"),
            job("개발자 A").with_location("서울").with_experience("10년 이상"),
            job("개발자 B").with_location("서울").with_education("박사"),
        ];

        let kept = FilterChain::apply(&criteria, jobs);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "백엔드 개발자");
    }

    #[test]
    fn test_empty_criteria_passes_everything() {
        let criteria = FilterCriteria::default();
        assert!(criteria.is_empty());

        let jobs = vec![job("a"), job("b")];
        assert_eq!(FilterChain::apply(&criteria, jobs.clone()), jobs);
    }

    fn arb_job() -> impl Strategy<Value = JobListing> {
        (
            prop::sample::select(vec!["백엔드 개발자", "영업", "데이터 엔지니어", "Developer"]),
            prop::sample::select(vec!["", "https://x/1", "https://x/2", "https://x/3"]),
            prop::sample::select(vec!["", "서울", "부산", "서울/경기"]),
            prop::sample::select(vec!["", "신입", "2년", "5년 이상", "경력"]),
            prop::sample::select(vec!["", "대졸", "석사", "학력무관", "고졸"]),
        )
            .prop_map(|(title, link, location, experience, education)| {
                job(title)
                    .with_link(link)
                    .with_location(location)
                    .with_experience(experience)
                    .with_education(education)
            })
    }

    fn arb_criteria() -> impl Strategy<Value = FilterCriteria> {
        (
            prop::sample::select(vec!["", "개발자", "developer 엔지니어"]),
            prop::collection::vec(prop::sample::select(vec!["서울", "부산"]), 0..2),
            prop::option::of(0u32..6),
            prop::option::of(prop::sample::select(EducationLevel::ALL.to_vec())),
        )
            .prop_map(|(query, regions, years, education)| {
                FilterCriteria::for_query(query)
                    .with_regions(regions)
                    .with_max_experience(years)
                    .with_max_education(education)
            })
    }

    proptest! {
        #[test]
        fn prop_dedup_is_idempotent(jobs in prop::collection::vec(arb_job(), 0..30)) {
            let once = dedup(jobs);
            let twice = dedup(once.clone());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_stages_never_grow(
            jobs in prop::collection::vec(arb_job(), 0..30),
            criteria in arb_criteria(),
        ) {
            for stage in FilterStage::ORDER {
                let before = jobs.len();
                let after = stage.apply(&criteria, jobs.clone());
                prop_assert!(after.len() <= before);
                prop_assert!(after.iter().all(|j| jobs.contains(j)));
            }
        }
    }
}
