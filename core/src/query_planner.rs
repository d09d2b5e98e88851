//! Role-scoped complaint listing.
//!
//! plan()     : caller role + optional filters -> conjunctive predicates
//! finalize() : in-memory sort, limit, derived `is_overdue`
//!
//! RULE: the store is never asked to order. Sorting is created_at DESC with
//! complaint_id ASC as the tie-break, so equal timestamps list identically
//! on every call.

use crate::{
    complaint::{Complaint, ComplaintStatus, Priority},
    config::{CityJurisdiction, CoreConfig},
    role::{AdminLevel, Role, RoleProfile},
    types::{Timestamp, UserId},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplaintFilters {
    pub status: Option<ComplaintStatus>,
    pub priority: Option<Priority>,
    pub state: Option<String>,
    pub district: Option<String>,
    /// Extra ward condition, ANDed with any jurisdiction scope.
    pub ward: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    OwnerIs(UserId),
    WardIs(String),
    StateNameIs(String),
    DistrictNameIs(String),
    DistrictNameIn(Vec<String>),
    StatusIs(ComplaintStatus),
    PriorityIs(Priority),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    pub predicates: Vec<Predicate>,
    pub limit: Option<usize>,
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

pub struct QueryPlanner<'a> {
    config: &'a CoreConfig,
}

impl<'a> QueryPlanner<'a> {
    pub fn new(config: &'a CoreConfig) -> Self {
        Self { config }
    }

    pub fn plan(&self, filters: &ComplaintFilters, caller: &RoleProfile) -> QueryPlan {
        let (level, assigned_ward, assigned_city) = match &caller.role {
            // Citizens see their own complaints and nothing else applies.
            Role::Citizen => {
                return QueryPlan {
                    predicates: vec![Predicate::OwnerIs(caller.user_id.clone())],
                    limit: None,
                };
            }
            Role::Admin {
                level,
                assigned_ward,
                assigned_city,
            } => (*level, non_blank(assigned_ward), non_blank(assigned_city)),
        };

        let mut predicates = Vec::new();
        match (level, assigned_ward, assigned_city) {
            (AdminLevel::Ward, Some(ward), _) => predicates.push(Predicate::WardIs(ward)),
            (AdminLevel::City, _, Some(city)) => predicates.push(self.city_scope(&city)),
            _ => {}
        }

        if let Some(status) = filters.status {
            predicates.push(Predicate::StatusIs(status));
        }
        if let Some(priority) = filters.priority {
            predicates.push(Predicate::PriorityIs(priority));
        }
        if let Some(state) = non_blank(&filters.state) {
            predicates.push(Predicate::StateNameIs(state));
        }
        if let Some(district) = non_blank(&filters.district) {
            predicates.push(Predicate::DistrictNameIs(district));
        }
        if let Some(ward) = non_blank(&filters.ward) {
            predicates.push(Predicate::WardIs(ward));
        }

        QueryPlan {
            predicates,
            limit: filters.limit,
        }
    }

    fn city_scope(&self, city: &str) -> Predicate {
        match self.config.city_jurisdiction(city) {
            Some(CityJurisdiction::State { state_name }) => {
                Predicate::StateNameIs(state_name.clone())
            }
            Some(CityJurisdiction::Districts { district_names }) => {
                Predicate::DistrictNameIn(district_names.clone())
            }
            None => Predicate::DistrictNameIs(city.to_string()),
        }
    }

    /// Sort, cut to the limit, then derive the transient overdue flag.
    pub fn finalize(
        &self,
        mut rows: Vec<Complaint>,
        limit: Option<usize>,
        now: Timestamp,
    ) -> Vec<Complaint> {
        rows.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.complaint_id.cmp(&b.complaint_id))
        });
        if let Some(limit) = limit {
            rows.truncate(limit);
        }

        let window = self.config.sla_window();
        for c in &mut rows {
            if c.status.is_open() && !c.is_overdue && now - c.created_at >= window {
                c.is_overdue = true;
            }
        }
        rows
    }
}
