// ==========================================
// 门店集群商品建议系统 - 建议流水线
// ==========================================
// 流程: 输入索引 → 同组统计 → 分类 → 动作分配 → 数量 → 调拨对齐
//       → 售罄率校验 → ROI 门控 (可选) → 单店截断 → 门店汇总
// 调拨整理: 校验后与截断后各一次, 对手方缺失的调拨退回单边动作
// 红线: 单候选问题隔离 (跳过/拒绝并计数), 批次级问题向上传播
//       一次调用要么产出完整结果, 要么在产出前报错 (无部分落地)
//       数值结果与墙钟/随机数无关 (run_id / generated_at 仅为元数据)
// ==========================================

use crate::config::EngineConfig;
use crate::domain::diagnostics::{
    BatchDiagnostics, RejectionRecord, RejectionStage, SkipRecord,
};
use crate::domain::opportunity::{Opportunity, StoreAggregate};
use crate::domain::types::RuleKind;
use crate::engine::aggregator::ResultAggregator;
use crate::engine::classifier::{classifier_for, ClassifierInput, OpportunityClassifier};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::inputs::{BatchInputs, ClusterIndex, FeatureCatalog, LedgerIndex, MetricTable};
use crate::engine::margin_resolver::MarginResolver;
use crate::engine::peer_stats::PeerGroupStatistics;
use crate::engine::price_resolver::PriceResolver;
use crate::engine::quantity::QuantityRecommender;
use crate::engine::redistribution::{
    assign_actions, balance_transfers, detach_orphaned_transfers, ActionCandidate,
    PlannedCandidate,
};
use crate::engine::repositories::PipelineRepositories;
use crate::engine::roi_gate::RoiGate;
use crate::engine::sell_through::{SellThroughIndex, SellThroughRequest, SellThroughValidator};
use crate::repository::sources::BatchPersistRequest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// BatchOutcome - 一次批处理的结果
// ==========================================
#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub rule: RuleKind,
    /// 通过全部校验且未被截断的单品建议
    pub opportunities: Vec<Opportunity>,
    /// 集群分配表中每店一行
    pub aggregates: Vec<StoreAggregate>,
    pub diagnostics: BatchDiagnostics,
}

impl BatchOutcome {
    pub fn opportunities_for<'a>(
        &'a self,
        store_code: &'a str,
    ) -> impl Iterator<Item = &'a Opportunity> + 'a {
        self.opportunities
            .iter()
            .filter(move |o| o.store_code == store_code)
    }

    pub fn aggregate_for(&self, store_code: &str) -> Option<&StoreAggregate> {
        self.aggregates.iter().find(|a| a.store_code == store_code)
    }

    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| EngineError::Other(e.into()))
    }
}

/// 单候选处理所需的各环节
struct CandidateStages<'a> {
    rule: RuleKind,
    recommender: QuantityRecommender<'a>,
    validator: SellThroughValidator<'a>,
    roi_gate: RoiGate<'a>,
    catalog: &'a FeatureCatalog,
}

// ==========================================
// RecommendationPipeline
// ==========================================
pub struct RecommendationPipeline {
    config: EngineConfig,
}

impl RecommendationPipeline {
    /// 创建流水线; 配置非法时立即失败
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 按规则种类运行
    pub fn run_rule(&self, inputs: &BatchInputs, rule: RuleKind) -> EngineResult<BatchOutcome> {
        let classifier = classifier_for(rule, &self.config);
        self.run(inputs, classifier.as_ref())
    }

    /// 运行一次批处理
    #[instrument(
        skip(self, inputs, classifier),
        fields(
            rule = %classifier.rule(),
            stores = inputs.assignments.len(),
            sales_rows = inputs.sales.len(),
            ledger_rows = inputs.ledger.len()
        )
    )]
    pub fn run(
        &self,
        inputs: &BatchInputs,
        classifier: &dyn OpportunityClassifier,
    ) -> EngineResult<BatchOutcome> {
        let started = Instant::now();
        let rule = classifier.rule();

        // ===== 1. 输入索引 =====
        let clusters = ClusterIndex::build(&inputs.assignments)?;
        let metrics = MetricTable::build(&inputs.sales, &clusters, inputs.period_label.as_deref())?;
        let ledger = LedgerIndex::build(&inputs.ledger);
        let catalog = FeatureCatalog::build(&inputs.sales);

        let mut diagnostics = BatchDiagnostics {
            ignored_sales_rows: metrics.ignored_rows(),
            ..BatchDiagnostics::default()
        };

        // ===== 2. 同组统计 =====
        let peer_stats = PeerGroupStatistics::new(self.config.min_cluster_size).compute_for_basis(
            classifier.metric_basis(),
            &clusters,
            &metrics,
            &ledger,
        );
        if peer_stats.is_empty() {
            return Err(EngineError::data_unavailable(
                "peer_group_statistics",
                format!(
                    "没有任何 (集群, 商品) 组达到 min_cluster_size={} (排除 {} 组)",
                    self.config.min_cluster_size,
                    peer_stats.excluded_groups()
                ),
            ));
        }
        diagnostics.peer_groups = peer_stats.len();

        // ===== 3. 分类 + 动作 =====
        let verdicts = classifier.classify(&ClassifierInput {
            clusters: &clusters,
            metrics: &metrics,
            ledger: &ledger,
            peer_stats: &peer_stats,
        });
        for verdict in &verdicts {
            diagnostics.record_classification(&verdict.classification.label());
        }
        let candidates =
            assign_actions(classifier, &verdicts, self.config.redistribution_strategy);

        info!(
            peer_groups = peer_stats.len(),
            excluded_groups = peer_stats.excluded_groups(),
            verdicts = verdicts.len(),
            candidates = candidates.len(),
            "分类完成"
        );

        // ===== 4. 数量 / 校验 / 门控 =====
        let prices = PriceResolver::build(&clusters, &ledger, &metrics);
        let margins =
            MarginResolver::build(inputs.margins.as_deref(), self.config.default_margin_rate);
        let sell_through = SellThroughIndex::build(&clusters, &ledger, &metrics, &catalog);
        let stages = CandidateStages {
            rule,
            recommender: QuantityRecommender::new(&self.config, &prices, &margins, &catalog),
            validator: SellThroughValidator::new(
                &self.config.sell_through,
                self.config.min_comparables,
                &sell_through,
            ),
            roi_gate: RoiGate::new(&self.config.roi, self.config.min_comparables),
            catalog: &catalog,
        };

        let mut planned: Vec<PlannedCandidate> = candidates
            .into_iter()
            .filter_map(|candidate| plan_candidate(&stages, candidate, &mut diagnostics))
            .collect();
        let (balanced, mut detached) = balance_transfers(&mut planned);

        let mut accepted: Vec<Opportunity> = planned
            .into_iter()
            .filter_map(|planned| validate_candidate(&stages, planned, &mut diagnostics))
            .collect();
        detached += detach_orphaned_transfers(&mut accepted);

        // ===== 5. 截断 + 汇总 =====
        let aggregator = ResultAggregator::new(self.config.max_opportunities_per_store);
        let mut opportunities = aggregator.apply_cap(accepted, &mut diagnostics);
        detached += detach_orphaned_transfers(&mut opportunities);
        diagnostics.transfers_balanced = balanced;
        diagnostics.transfers_detached = detached;
        debug!(balanced, detached, "调拨整理完成");

        let aggregates = aggregator.aggregate(&clusters, &opportunities);

        info!(
            opportunities = opportunities.len(),
            stores = aggregates.len(),
            skipped = diagnostics.total_skipped(),
            rejected = diagnostics.total_rejected(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "批处理完成"
        );

        Ok(BatchOutcome {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            rule,
            opportunities,
            aggregates,
            diagnostics,
        })
    }

    /// 从协作方读取输入, 运行, 整批成功后落地
    /// 销售按全部期间读取 (品类/季节目录跨期间), 期间过滤在指标表构建时进行
    #[instrument(skip_all, fields(rule = %rule, period = ?period_label))]
    pub async fn run_with_repositories(
        &self,
        repos: &PipelineRepositories,
        rule: RuleKind,
        period_label: Option<&str>,
    ) -> EngineResult<BatchOutcome> {
        let (assignments, sales, ledger, margins) = futures::try_join!(
            repos.assignments.load_assignments(),
            repos.sales.load_sales(None),
            repos.ledger.load_ledger(),
            repos.margins.load_margin_rates(),
        )?;
        debug!(
            assignments = assignments.len(),
            sales = sales.len(),
            ledger = ledger.len(),
            has_margins = margins.is_some(),
            "协作方数据读取完成"
        );

        let inputs = BatchInputs {
            assignments,
            sales,
            ledger,
            margins,
            period_label: period_label.map(str::to_string),
        };
        let outcome = self.run_rule(&inputs, rule)?;

        let written = repos
            .sink
            .persist_batch(BatchPersistRequest {
                run_id: outcome.run_id,
                opportunities: &outcome.opportunities,
                aggregates: &outcome.aggregates,
                diagnostics: &outcome.diagnostics,
            })
            .await?;
        info!(run_id = %outcome.run_id, written, "批次结果已落地");

        Ok(outcome)
    }
}

/// 单候选数量; 跳过记入诊断并返回 None
fn plan_candidate(
    stages: &CandidateStages<'_>,
    candidate: ActionCandidate,
    diagnostics: &mut BatchDiagnostics,
) -> Option<PlannedCandidate> {
    match stages.recommender.recommend(&candidate.verdict) {
        Ok(plan) => Some(PlannedCandidate { candidate, plan }),
        Err(reason) => {
            let verdict = &candidate.verdict;
            warn!(
                store_code = %verdict.store_code,
                feature_key = %verdict.feature_key,
                reason = %reason,
                "候选跳过"
            );
            diagnostics.record_skip(SkipRecord {
                store_code: verdict.store_code.clone(),
                feature_key: verdict.feature_key.clone(),
                rule: stages.rule,
                reason,
            });
            None
        }
    }
}

/// 单候选: 售罄率 → ROI; 拒绝记入诊断并返回 None
fn validate_candidate(
    stages: &CandidateStages<'_>,
    planned: PlannedCandidate,
    diagnostics: &mut BatchDiagnostics,
) -> Option<Opportunity> {
    let PlannedCandidate {
        candidate:
            ActionCandidate {
                verdict,
                action,
                transfer_partner,
            },
        plan,
    } = planned;

    let sell_through = stages.validator.validate(&SellThroughRequest {
        action,
        quantity: plan.quantity,
        store_code: &verdict.store_code,
        cluster_id: &verdict.cluster_id,
        category: &plan.category,
        season: stages.catalog.season(&verdict.feature_key),
        adoption: verdict.peer_adoption,
    });
    if !sell_through.approved {
        warn!(
            store_code = %verdict.store_code,
            feature_key = %verdict.feature_key,
            predicted = sell_through.predicted_rate,
            improvement = sell_through.improvement,
            "售罄率校验未通过"
        );
        diagnostics.record_rejection(RejectionRecord {
            store_code: verdict.store_code.clone(),
            feature_key: verdict.feature_key.clone(),
            rule: stages.rule,
            stage: RejectionStage::SellThrough,
            rationale: sell_through.rationale,
        });
        return None;
    }

    let roi = stages.roi_gate.evaluate(
        plan.price.value,
        plan.unit_cost,
        plan.quantity,
        verdict.peer_count,
    );
    if let Some(r) = roi.as_ref().filter(|r| !r.approved) {
        warn!(
            store_code = %verdict.store_code,
            feature_key = %verdict.feature_key,
            roi = r.roi,
            margin_uplift = r.margin_uplift,
            "ROI 门控未通过"
        );
        diagnostics.record_rejection(RejectionRecord {
            store_code: verdict.store_code.clone(),
            feature_key: verdict.feature_key.clone(),
            rule: stages.rule,
            stage: RejectionStage::Roi,
            rationale: r.rationale.clone(),
        });
        return None;
    }

    let rationale = json!({
        "rule": stages.rule,
        "classification": verdict.classification.label(),
        "action": action,
        "z_score": verdict.z_score,
        "metric_gap": verdict.metric_gap,
        "gap_unit": verdict.gap_unit,
        "store_value": verdict.store_value,
        "peer_count": verdict.peer_count,
        "peer_adoption": verdict.peer_adoption,
        "price": { "source": plan.price.source, "value": plan.price.value },
        "margin": { "source": plan.margin.source, "value": plan.margin.value },
        "quantity": {
            "raw": plan.raw_quantity,
            "final": plan.quantity,
            "current_stock": verdict.current_quantity,
        },
        "sell_through": {
            "current": sell_through.current_rate,
            "predicted": sell_through.predicted_rate,
            "improvement": sell_through.improvement,
        },
        "roi": roi.as_ref().map(|r| json!({ "roi": r.roi, "margin_uplift": r.margin_uplift })),
        "transfer_partner": transfer_partner,
    })
    .to_string();

    Some(Opportunity {
        store_code: verdict.store_code,
        cluster_id: verdict.cluster_id,
        feature_key: verdict.feature_key,
        rule: stages.rule,
        classification: verdict.classification,
        action,
        z_score: verdict.z_score,
        metric_gap: verdict.metric_gap,
        peer_count: verdict.peer_count,
        recommended_quantity_change: plan.quantity,
        unit_price: plan.price.value,
        price_source: plan.price.source,
        margin_rate: plan.margin.value,
        margin_source: plan.margin.source,
        unit_cost: plan.unit_cost,
        investment_required: plan.investment_required,
        retail_value: plan.retail_value,
        current_sell_through_rate: sell_through.current_rate,
        predicted_sell_through_rate: sell_through.predicted_rate,
        sell_through_improvement: sell_through.improvement,
        roi: roi.as_ref().map(|r| r.roi),
        margin_uplift: roi.as_ref().map(|r| r.margin_uplift),
        transfer_partner,
        approved: true,
        rationale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sales::{QuantityLedgerEntry, SalesRecord};
    use crate::domain::store::Store;

    fn inputs() -> BatchInputs {
        let assignments: Vec<Store> = (1..=5).map(|i| Store::new(format!("S{}", i), "C1")).collect();
        let mut sales = Vec::new();
        let mut ledger = Vec::new();
        // 在售门店: F1 畅销, F2 在库未售 → 品类售罄率 50%
        for i in 1..=4 {
            let store = format!("S{}", i);
            sales.push(SalesRecord::new(store.clone(), "F1", "P1", 500.0).with_category("TOPS"));
            sales.push(SalesRecord::new(store.clone(), "F2", "P1", 0.0).with_category("TOPS"));
            ledger.push(QuantityLedgerEntry::new(store.clone(), "F1", 10.0, 50.0));
            ledger.push(QuantityLedgerEntry::new(store, "F2", 10.0, 40.0));
        }
        BatchInputs {
            assignments,
            sales,
            ledger,
            margins: None,
            period_label: None,
        }
    }

    #[test]
    fn test_invalid_config_rejected_before_run() {
        let mut config = EngineConfig::default();
        config.min_quantity_change = 10.0;
        config.max_quantity_change = 5.0;
        let err = RecommendationPipeline::new(config).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_missing_feature_run() {
        let pipeline = RecommendationPipeline::new(EngineConfig::default()).unwrap();
        let outcome = pipeline.run_rule(&inputs(), RuleKind::MissingFeature).unwrap();

        assert_eq!(outcome.aggregates.len(), 5);
        assert_eq!(outcome.diagnostics.peer_groups, 1);
        assert_eq!(outcome.diagnostics.verdicts, 1);

        let opp = &outcome.opportunities[0];
        assert_eq!(opp.store_code, "S5");
        // 缺失门店: 单价取集群中位数 50, 500 / 50 = 10 件
        assert_eq!(opp.recommended_quantity_change, 10);
        let rationale: serde_json::Value = serde_json::from_str(&opp.rationale).unwrap();
        assert_eq!(rationale["price"]["source"], "CLUSTER_MEDIAN");
        // 0.2 × 铺货率估计 + 0.8 × 50
        assert!(opp.predicted_sell_through_rate > 50.0 && opp.predicted_sell_through_rate < 60.0);
        // S5 无在库数据: 当前售罄率取集群历史
        assert_eq!(opp.current_sell_through_rate, 50.0);
    }

    #[test]
    fn test_no_peer_stats_is_terminal() {
        let mut config = EngineConfig::default();
        config.min_cluster_size = 5;
        let pipeline = RecommendationPipeline::new(config).unwrap();
        let err = pipeline.run_rule(&inputs(), RuleKind::MissingFeature).unwrap_err();
        assert!(err.is_data_unavailable());
    }
}
