use booksearch_core::analyzer::{Analyzer, AnalyzerConfig, BigramSegmenter, Segmenter, SegmenterKind};

#[test]
fn it_normalizes_full_width_and_case() {
    let a = Analyzer::new(AnalyzerConfig { stem: false, ..AnalyzerConfig::default() });
    let words = a.terms("ＲＵＳＴ Café's Menu");
    assert!(words.contains(&"rust".to_string()));
    assert!(words.contains(&"café".to_string()));
    assert!(words.contains(&"menu".to_string()));
}

#[test]
fn it_is_deterministic() {
    let a = Analyzer::default();
    let text = "《三体》是刘慈欣创作的长篇科幻小说 The Three-Body Problem";
    assert_eq!(a.tokenize(text), a.tokenize(text));
    assert_eq!(Analyzer::new(a.config()).tokenize(text), a.tokenize(text));
}

#[test]
fn index_and_query_share_terms() {
    let a = Analyzer::new(AnalyzerConfig { segmenter: SegmenterKind::Bigram, stem: true });
    let indexed = a.terms("深入理解计算机系统（原书第3版）");
    for term in a.terms("计算机系统") {
        assert!(indexed.contains(&term), "missing {term}");
    }
}

#[test]
fn segmenters_are_pluggable() {
    let mut out = Vec::new();
    BigramSegmenter.segment("水浒传", &mut out);
    assert_eq!(out, vec!["水浒", "浒传"]);
}
