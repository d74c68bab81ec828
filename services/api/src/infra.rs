use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

use audit_ops::workflows::audits::{
    Audit, AuditFilter, AuditId, AuditNotification, AuditRepository, AuditorAssignment, Branch,
    BranchId, Directory, DispatchError, Frequency, NotificationDispatcher, Organization, OrgId,
    Question, QuestionKind, QuestionWeight, RepositoryError, Role, Survey, SurveyId,
    SurveySection, User, UserId, WeekStart,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Directory store backing the service until the upstream org systems are
/// wired in. Ships with one seeded organization so `serve` and `sync` are
/// exercisable out of the box.
#[derive(Default)]
pub(crate) struct InMemoryDirectory {
    orgs: Mutex<Vec<Organization>>,
    branches: Mutex<Vec<Branch>>,
    surveys: Mutex<Vec<Survey>>,
    users: Mutex<Vec<User>>,
    assignments: Mutex<Vec<AuditorAssignment>>,
    cursors: Mutex<HashMap<(OrgId, Frequency), DateTime<Utc>>>,
}

impl InMemoryDirectory {
    pub(crate) fn seeded() -> Self {
        let directory = Self::default();
        {
            let mut orgs = directory.orgs.lock().expect("directory mutex poisoned");
            orgs.push(Organization {
                id: OrgId("org-demo".to_string()),
                name: "Demo Retail Group".to_string(),
                time_zone: "America/Chicago".to_string(),
                week_start: WeekStart::Monday,
                gating_policy: "completed_approved".to_string(),
            });
        }
        {
            let mut branches = directory.branches.lock().expect("directory mutex poisoned");
            branches.push(Branch {
                id: BranchId("br-north".to_string()),
                org_id: OrgId("org-demo".to_string()),
                name: "Northside".to_string(),
                manager_id: Some(UserId("mgr-demo".to_string())),
            });
            branches.push(Branch {
                id: BranchId("br-south".to_string()),
                org_id: OrgId("org-demo".to_string()),
                name: "Southside".to_string(),
                manager_id: None,
            });
        }
        {
            let mut surveys = directory.surveys.lock().expect("directory mutex poisoned");
            surveys.push(Survey {
                id: SurveyId("srv-safety".to_string()),
                org_id: OrgId("org-demo".to_string()),
                title: "Weekly Safety Walk".to_string(),
                version: 1,
                frequency: Frequency::Weekly,
                active: true,
                sections: vec![SurveySection {
                    id: "sec-floor".to_string(),
                    title: "Floor".to_string(),
                    questions: vec![
                        Question {
                            id: "q-exits".to_string(),
                            prompt: "Emergency exits clear?".to_string(),
                            kind: QuestionKind::YesNo,
                            required: true,
                            weight: Some(QuestionWeight {
                                yes_points: 10,
                                no_points: 0,
                            }),
                        },
                        Question {
                            id: "q-spills".to_string(),
                            prompt: "Spill kit stocked?".to_string(),
                            kind: QuestionKind::YesNoNa,
                            required: true,
                            weight: None,
                        },
                    ],
                }],
            });
        }
        {
            let mut users = directory.users.lock().expect("directory mutex poisoned");
            users.extend([
                User {
                    id: UserId("aud-demo".to_string()),
                    org_id: OrgId("org-demo".to_string()),
                    name: "Demo Auditor".to_string(),
                    role: Role::Auditor,
                },
                User {
                    id: UserId("mgr-demo".to_string()),
                    org_id: OrgId("org-demo".to_string()),
                    name: "Demo Manager".to_string(),
                    role: Role::BranchManager,
                },
                User {
                    id: UserId("adm-demo".to_string()),
                    org_id: OrgId("org-demo".to_string()),
                    name: "Demo Admin".to_string(),
                    role: Role::Admin,
                },
            ]);
        }
        directory
    }
}

impl Directory for InMemoryDirectory {
    fn organizations(&self) -> Result<Vec<Organization>, RepositoryError> {
        Ok(self.orgs.lock().expect("directory mutex poisoned").clone())
    }

    fn organization(&self, id: &OrgId) -> Result<Option<Organization>, RepositoryError> {
        Ok(self
            .orgs
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .find(|org| &org.id == id)
            .cloned())
    }

    fn branches_in(&self, org_id: &OrgId) -> Result<Vec<Branch>, RepositoryError> {
        Ok(self
            .branches
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .filter(|branch| &branch.org_id == org_id)
            .cloned()
            .collect())
    }

    fn branch(&self, id: &BranchId) -> Result<Option<Branch>, RepositoryError> {
        Ok(self
            .branches
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .find(|branch| &branch.id == id)
            .cloned())
    }

    fn active_surveys(&self, org_id: &OrgId) -> Result<Vec<Survey>, RepositoryError> {
        Ok(self
            .surveys
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .filter(|survey| &survey.org_id == org_id && survey.active)
            .cloned()
            .collect())
    }

    fn survey(&self, id: &SurveyId) -> Result<Option<Survey>, RepositoryError> {
        Ok(self
            .surveys
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .find(|survey| &survey.id == id)
            .cloned())
    }

    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        Ok(self
            .users
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .find(|user| &user.id == id)
            .cloned())
    }

    fn assignments_in(&self, org_id: &OrgId) -> Result<Vec<AuditorAssignment>, RepositoryError> {
        let users = self.users.lock().expect("directory mutex poisoned");
        Ok(self
            .assignments
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .filter(|assignment| {
                users
                    .iter()
                    .any(|user| user.id == assignment.user_id && &user.org_id == org_id)
            })
            .cloned()
            .collect())
    }

    fn store_assignment(&self, assignment: AuditorAssignment) -> Result<(), RepositoryError> {
        self.assignments
            .lock()
            .expect("directory mutex poisoned")
            .push(assignment);
        Ok(())
    }

    fn clear_branch_assignments(&self, org_id: &OrgId) -> Result<(), RepositoryError> {
        let users = self.users.lock().expect("directory mutex poisoned");
        for assignment in self
            .assignments
            .lock()
            .expect("directory mutex poisoned")
            .iter_mut()
        {
            let in_org = users
                .iter()
                .any(|user| user.id == assignment.user_id && &user.org_id == org_id);
            if in_org {
                assignment.branch_ids.clear();
            }
        }
        Ok(())
    }

    fn period_cursor(
        &self,
        org_id: &OrgId,
        frequency: Frequency,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(self
            .cursors
            .lock()
            .expect("directory mutex poisoned")
            .get(&(org_id.clone(), frequency))
            .copied())
    }

    fn record_period_cursor(
        &self,
        org_id: &OrgId,
        frequency: Frequency,
        period_start: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.cursors
            .lock()
            .expect("directory mutex poisoned")
            .insert((org_id.clone(), frequency), period_start);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryAuditRepository {
    records: Mutex<HashMap<AuditId, Audit>>,
}

impl AuditRepository for InMemoryAuditRepository {
    fn insert(&self, audit: Audit) -> Result<Audit, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&audit.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(audit.id.clone(), audit.clone());
        Ok(audit)
    }

    fn update(&self, audit: Audit) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.contains_key(&audit.id) {
            guard.insert(audit.id.clone(), audit);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch(&self, id: &AuditId) -> Result<Option<Audit>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn query(&self, filter: &AuditFilter) -> Result<Vec<Audit>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|audit| filter.matches(audit))
            .cloned()
            .collect())
    }
}

/// Notification sink that writes to the service log until a real transport
/// (email, push) is configured.
#[derive(Default)]
pub(crate) struct LogNotifier;

impl NotificationDispatcher for LogNotifier {
    fn dispatch(&self, notification: AuditNotification) -> Result<(), DispatchError> {
        info!(
            recipient = %notification.recipient.0,
            audit_id = %notification.audit_id.0,
            kind = ?notification.kind,
            branch = %notification.branch_name,
            "audit notification"
        );
        Ok(())
    }
}
