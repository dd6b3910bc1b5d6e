//! Decision engine: probed state + policy → exactly one [`Action`].
//!
//! The table is evaluated top to bottom and the first matching rule wins.
//! It is pure; the only way it can fail is when the database could not be
//! classified and no rule can decide safely without that knowledge.

use crate::error::{ProvisionError, Result};
use crate::types::{Action, BenchState, DatabaseSchemaState, ProbedState, SiteConfigState};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Explicit bypass of the populated-schema guard (`ALLOW_NON_EMPTY_SCHEMA`).
    pub allow_non_empty_schema: bool,
    /// Operator asserts the tenant already exists (`EXISTING_SITE`).
    /// Permission to adopt, never proof that data exists.
    pub existing_site: bool,
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

pub struct DecisionContext<'a> {
    pub state: &'a ProbedState,
    pub policy: Policy,
}

/// A fn-pointer rule; the table is static and allocation-free.
pub struct Rule {
    pub id: &'static str,
    pub condition: fn(&DecisionContext) -> bool,
    pub action: fn(&DecisionContext) -> Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub rule: String,
    pub action: Action,
    /// Operator-facing remarks that do not change the outcome.
    pub notes: Vec<String>,
}

// ---------------------------------------------------------------------------
// Condition helpers
// ---------------------------------------------------------------------------

fn has_apps(ctx: &DecisionContext) -> bool {
    ctx.state.bench == BenchState::PresentWithApps
}

fn config_valid(ctx: &DecisionContext) -> bool {
    ctx.state.site_config == SiteConfigState::PresentValid
}

fn populated(ctx: &DecisionContext) -> bool {
    ctx.state.schema.is_populated()
}

fn marker_present(ctx: &DecisionContext) -> bool {
    ctx.state.schema.has_marker()
}

fn nothing_to_protect(ctx: &DecisionContext) -> bool {
    match &ctx.state.schema {
        DatabaseSchemaState::EmbeddedLocal
        | DatabaseSchemaState::ExternalAbsent
        | DatabaseSchemaState::ExternalEmpty => true,
        DatabaseSchemaState::ExternalPopulated { .. } => !populated(ctx),
        DatabaseSchemaState::ExternalUnreachable { .. } => false,
    }
}

fn refuse(ctx: &DecisionContext) -> Action {
    Action::RefuseNonEmptyForeignSchema {
        table_count: ctx.state.schema.table_count(),
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Orphaned and absent site configs are never distinguished below: only
/// `config_valid` looks at the site config at all.
pub fn decision_table() -> Vec<Rule> {
    vec![
        Rule {
            id: "known-site-migrates",
            condition: |ctx| has_apps(ctx) && config_valid(ctx),
            action: |_| Action::MigrateExistingSite,
        },
        Rule {
            id: "bench-adopts-initialized-schema",
            condition: |ctx| has_apps(ctx) && populated(ctx) && marker_present(ctx),
            action: |_| Action::AdoptExistingExternalSchema,
        },
        Rule {
            id: "bench-creates-on-uninitialized-schema",
            condition: |ctx| has_apps(ctx) && (nothing_to_protect(ctx) || populated(ctx)),
            action: |_| Action::CreateFreshSite,
        },
        Rule {
            id: "fresh-bench-guard",
            condition: |ctx| {
                !has_apps(ctx) && populated(ctx) && !ctx.policy.allow_non_empty_schema
            },
            action: refuse,
        },
        Rule {
            id: "fresh-bench-override-adopts",
            condition: |ctx| !has_apps(ctx) && populated(ctx) && marker_present(ctx),
            action: |_| Action::AdoptExistingExternalSchema,
        },
        Rule {
            id: "fresh-bench-override-creates",
            condition: |ctx| !has_apps(ctx) && populated(ctx),
            action: |_| Action::CreateFreshSite,
        },
        Rule {
            id: "fresh-bench-creates",
            condition: |ctx| !has_apps(ctx) && nothing_to_protect(ctx),
            action: |_| Action::CreateFreshSite,
        },
    ]
}

pub fn decide(state: &ProbedState, policy: Policy) -> Result<Decision> {
    let ctx = DecisionContext { state, policy };
    for rule in decision_table() {
        if (rule.condition)(&ctx) {
            let action = (rule.action)(&ctx);
            return Ok(Decision {
                rule: rule.id.to_string(),
                action,
                notes: notes_for(&ctx, action),
            });
        }
    }

    match &state.schema {
        DatabaseSchemaState::ExternalUnreachable { reason } => {
            Err(ProvisionError::AmbiguousState(format!(
                "bench is {} and site config is {}, but the external schema could not be \
                 classified ({reason}); refusing to guess between create and adopt",
                state.bench, state.site_config
            )))
        }
        other => Err(ProvisionError::AmbiguousState(format!(
            "no rule matches bench={} site_config={} schema={other}",
            state.bench, state.site_config
        ))),
    }
}

fn notes_for(ctx: &DecisionContext, action: Action) -> Vec<String> {
    let mut notes = Vec::new();
    if ctx.policy.existing_site && !populated(ctx) && action == Action::CreateFreshSite {
        notes.push(
            "EXISTING_SITE is set but the schema holds no tables; creating a fresh site instead \
             of adopting"
                .to_string(),
        );
    }
    if let Action::RefuseNonEmptyForeignSchema { .. } = action {
        if ctx.policy.existing_site {
            notes.push(
                "EXISTING_SITE does not bypass the populated-schema guard; set \
                 ALLOW_NON_EMPTY_SCHEMA=true to adopt this schema on a fresh bench"
                    .to_string(),
            );
        }
    }
    if ctx.state.site_config == SiteConfigState::PresentOrphaned {
        notes.push(
            "site config exists but its schema lacks the marker table; treating the config as absent"
                .to_string(),
        );
    }
    notes
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn classified_schemas() -> Vec<DatabaseSchemaState> {
        vec![
            DatabaseSchemaState::EmbeddedLocal,
            DatabaseSchemaState::ExternalAbsent,
            DatabaseSchemaState::ExternalEmpty,
            DatabaseSchemaState::ExternalPopulated {
                table_count: 40,
                has_marker: true,
            },
            DatabaseSchemaState::ExternalPopulated {
                table_count: 40,
                has_marker: false,
            },
        ]
    }

    fn state(
        bench: BenchState,
        site_config: SiteConfigState,
        schema: DatabaseSchemaState,
    ) -> ProbedState {
        ProbedState {
            bench,
            site_config,
            schema,
        }
    }

    fn policies() -> [Policy; 4] {
        [
            Policy::default(),
            Policy {
                allow_non_empty_schema: true,
                existing_site: false,
            },
            Policy {
                allow_non_empty_schema: false,
                existing_site: true,
            },
            Policy {
                allow_non_empty_schema: true,
                existing_site: true,
            },
        ]
    }

    #[test]
    fn every_classified_triple_yields_one_action() {
        for &bench in BenchState::all() {
            for &cfg in SiteConfigState::all() {
                for schema in classified_schemas() {
                    for policy in policies() {
                        let s = state(bench, cfg, schema.clone());
                        let d = decide(&s, policy);
                        assert!(d.is_ok(), "{s:?} {policy:?} → {d:?}");
                    }
                }
            }
        }
    }

    #[test]
    fn refuse_iff_fresh_bench_populated_and_no_override() {
        for &bench in BenchState::all() {
            for &cfg in SiteConfigState::all() {
                for schema in classified_schemas() {
                    for policy in policies() {
                        let s = state(bench, cfg, schema.clone());
                        let action = decide(&s, policy).unwrap().action;
                        let expected = bench.is_fresh()
                            && schema.is_populated()
                            && !policy.allow_non_empty_schema;
                        assert_eq!(
                            action.is_fatal(),
                            expected,
                            "{s:?} {policy:?} → {action:?}"
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn orphaned_resolves_like_absent_everywhere() {
        for &bench in BenchState::all() {
            for schema in classified_schemas() {
                for policy in policies() {
                    let absent = decide(&state(bench, SiteConfigState::Absent, schema.clone()), policy)
                        .unwrap()
                        .action;
                    let orphaned = decide(
                        &state(bench, SiteConfigState::PresentOrphaned, schema.clone()),
                        policy,
                    )
                    .unwrap()
                    .action;
                    assert_eq!(absent, orphaned, "{bench:?} {schema:?} {policy:?}");
                }
            }
        }
    }

    #[test]
    fn valid_config_on_bench_always_migrates() {
        for schema in classified_schemas() {
            let d = decide(
                &state(BenchState::PresentWithApps, SiteConfigState::PresentValid, schema),
                Policy::default(),
            )
            .unwrap();
            assert_eq!(d.action, Action::MigrateExistingSite);
        }
    }

    #[test]
    fn valid_config_wins_over_unreachable_counts() {
        let d = decide(
            &state(
                BenchState::PresentWithApps,
                SiteConfigState::PresentValid,
                DatabaseSchemaState::ExternalUnreachable {
                    reason: "timeout".into(),
                },
            ),
            Policy::default(),
        )
        .unwrap();
        assert_eq!(d.action, Action::MigrateExistingSite);
    }

    #[test]
    fn bench_with_initialized_schema_adopts() {
        let d = decide(
            &state(
                BenchState::PresentWithApps,
                SiteConfigState::Absent,
                DatabaseSchemaState::ExternalPopulated {
                    table_count: 812,
                    has_marker: true,
                },
            ),
            Policy::default(),
        )
        .unwrap();
        assert_eq!(d.action, Action::AdoptExistingExternalSchema);
    }

    #[test]
    fn dropped_marker_never_migrates() {
        let orphaned = state(
            BenchState::PresentWithApps,
            SiteConfigState::PresentOrphaned,
            DatabaseSchemaState::ExternalPopulated {
                table_count: 40,
                has_marker: false,
            },
        );
        let d = decide(&orphaned, Policy::default()).unwrap();
        assert_eq!(d.action, Action::CreateFreshSite);
        assert!(d.notes.iter().any(|n| n.contains("marker table")));

        let emptied = state(
            BenchState::PresentWithApps,
            SiteConfigState::PresentOrphaned,
            DatabaseSchemaState::ExternalEmpty,
        );
        assert_eq!(
            decide(&emptied, Policy::default()).unwrap().action,
            Action::CreateFreshSite
        );
    }

    #[test]
    fn fresh_bench_embedded_creates() {
        for bench in [BenchState::Absent, BenchState::PresentEmpty] {
            let d = decide(
                &state(bench, SiteConfigState::Absent, DatabaseSchemaState::EmbeddedLocal),
                Policy::default(),
            )
            .unwrap();
            assert_eq!(d.action, Action::CreateFreshSite);
            assert_eq!(d.rule, "fresh-bench-creates");
        }
    }

    #[test]
    fn fresh_bench_forty_tables_refuses_with_count() {
        let d = decide(
            &state(
                BenchState::Absent,
                SiteConfigState::Absent,
                DatabaseSchemaState::ExternalPopulated {
                    table_count: 40,
                    has_marker: true,
                },
            ),
            Policy::default(),
        )
        .unwrap();
        assert_eq!(
            d.action,
            Action::RefuseNonEmptyForeignSchema { table_count: 40 }
        );
    }

    #[test]
    fn override_adopts_initialized_and_creates_foreign() {
        let policy = Policy {
            allow_non_empty_schema: true,
            existing_site: false,
        };
        let initialized = state(
            BenchState::Absent,
            SiteConfigState::Absent,
            DatabaseSchemaState::ExternalPopulated {
                table_count: 40,
                has_marker: true,
            },
        );
        assert_eq!(
            decide(&initialized, policy).unwrap().action,
            Action::AdoptExistingExternalSchema
        );
        let foreign = state(
            BenchState::Absent,
            SiteConfigState::Absent,
            DatabaseSchemaState::ExternalPopulated {
                table_count: 40,
                has_marker: false,
            },
        );
        assert_eq!(
            decide(&foreign, policy).unwrap().action,
            Action::CreateFreshSite
        );
    }

    #[test]
    fn existing_site_flag_alone_does_not_bypass_guard() {
        let policy = Policy {
            allow_non_empty_schema: false,
            existing_site: true,
        };
        let d = decide(
            &state(
                BenchState::PresentEmpty,
                SiteConfigState::Absent,
                DatabaseSchemaState::ExternalPopulated {
                    table_count: 40,
                    has_marker: true,
                },
            ),
            policy,
        )
        .unwrap();
        assert!(d.action.is_fatal());
        assert!(d.notes.iter().any(|n| n.contains("does not bypass")));
    }

    #[test]
    fn existing_site_flag_on_empty_schema_creates_with_note() {
        let policy = Policy {
            allow_non_empty_schema: false,
            existing_site: true,
        };
        let d = decide(
            &state(
                BenchState::Absent,
                SiteConfigState::Absent,
                DatabaseSchemaState::ExternalEmpty,
            ),
            policy,
        )
        .unwrap();
        assert_eq!(d.action, Action::CreateFreshSite);
        assert!(d.notes.iter().any(|n| n.contains("EXISTING_SITE")));
    }

    #[test]
    fn unreachable_without_valid_config_fails_fast() {
        for &bench in BenchState::all() {
            for cfg in [SiteConfigState::Absent, SiteConfigState::PresentOrphaned] {
                let s = state(
                    bench,
                    cfg,
                    DatabaseSchemaState::ExternalUnreachable {
                        reason: "connection refused".into(),
                    },
                );
                let err = decide(&s, Policy::default()).unwrap_err();
                assert!(matches!(err, ProvisionError::AmbiguousState(_)));
                assert!(err.to_string().contains("connection refused"));
            }
        }
    }

    #[test]
    fn rule_ids_are_unique() {
        let table = decision_table();
        let mut ids: Vec<&str> = table.iter().map(|r| r.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), table.len());
    }
}
