use std::path::PathBuf;

use stat_agency::types::Arity;
use stat_agency::{ConfigLoader, KnowledgeStore, PreprocessStore, TypeSignature, VariableType};

fn repo_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

#[tokio::test]
async fn test_shipped_knowledge_loads() {
    let store = KnowledgeStore::load_file(repo_path("knowledge/statistical_kb.json")).await.unwrap();
    assert!(store
        .lookup(Arity::Univariate, &TypeSignature::Single(VariableType::NumericalContinuous))
        .is_some());
    assert!(store
        .lookup(
            Arity::Bivariate,
            &TypeSignature::Pair(VariableType::NumericalContinuous, VariableType::CategoricalNominal)
        )
        .is_some());

    let preprocess = PreprocessStore::load_file(repo_path("knowledge/preprocess_kb.json")).await.unwrap();
    for vtype in VariableType::ALL {
        assert!(preprocess.lookup(vtype).is_some(), "no preprocessing entry for {}", vtype);
    }
}

#[tokio::test]
async fn test_shipped_config_is_valid() {
    let config = ConfigLoader::new(repo_path("stat_agency.yaml")).load().await.unwrap();
    assert_eq!(config.analysis.critique_budget, 3);
    assert_eq!(config.paths.statistical_kb, PathBuf::from("knowledge/statistical_kb.json"));
}
