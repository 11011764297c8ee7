// ==========================================
// 规则配置覆写 - 集成测试
// ==========================================

mod helpers;

use cluster_merch_advisor::config::{EngineConfig, RuleProfile};
use cluster_merch_advisor::domain::types::{Granularity, RedistributionStrategy, RuleKind};
use cluster_merch_advisor::engine::RecommendationPipeline;
use helpers::test_data_builder::*;

const PROFILE_JSON: &str = r#"{
    "profile_id": "weekly_tight",
    "description": "每店只保留一条, 最多 5 件",
    "parameters": {
        "max_quantity_change": 5,
        "max_opportunities_per_store": 1,
        "redistribution_strategy": "paired",
        "seasonal_factors": { "AW": 0.9 }
    }
}"#;

#[test]
fn test_profile_json_drives_pipeline() {
    let profile = RuleProfile::from_json(PROFILE_JSON).unwrap();
    let config = EngineConfig::default().with_profile(&profile).unwrap();
    assert_eq!(config.redistribution_strategy, RedistributionStrategy::Paired);
    assert_eq!(config.sell_through.seasonal_factor(Some("AW")), 0.9);

    let outcome = RecommendationPipeline::new(config)
        .unwrap()
        .run_rule(&missing_feature_scenario().build(), RuleKind::MissingFeature)
        .unwrap();
    assert_eq!(outcome.opportunities.len(), 1);
    assert_eq!(outcome.opportunities[0].recommended_quantity_change, 5);
}

#[test]
fn test_out_of_range_profile_is_configuration_error() {
    let profile = RuleProfile::from_json(
        r#"{ "parameters": { "adoption_threshold": 1.5 } }"#,
    )
    .unwrap();
    let err = EngineConfig::default().with_profile(&profile).unwrap_err();
    assert!(err.is_configuration());

    let err = RuleProfile::from_json("{ not json").unwrap_err();
    assert!(err.is_configuration());
}

#[test]
fn test_spu_granularity_raises_imbalance_threshold() {
    let sub = EngineConfig::for_granularity(Granularity::Subcategory);
    let spu = EngineConfig::for_granularity(Granularity::Spu);
    assert!(spu.z_score_threshold() > sub.z_score_threshold());
    assert!(spu.validate().is_ok());

    let mut config = EngineConfig::default();
    config.min_cluster_size = 1;
    assert!(RecommendationPipeline::new(config).is_err());
}
