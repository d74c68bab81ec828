use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};

use crate::workflows::audits::domain::{
    Answer, Audit, AuditId, AuditStatus, AuditorAssignment, Branch, BranchId, Frequency,
    Organization, OrgId, Question, QuestionKind, QuestionWeight, Role, Survey, SurveyId,
    SurveySection, User, UserId, WeekStart,
};
use crate::workflows::audits::lifecycle::{AuditLifecycle, AuditUpdate};
use crate::workflows::audits::repository::{
    AuditFilter, AuditNotification, AuditRepository, Directory, DispatchError,
    NotificationDispatcher, RepositoryError,
};
use crate::workflows::audits::schedule::{Archiver, AuditScheduler};

/// Tuesday 2025-06-10 15:00 UTC, 10:00 in America/Chicago.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 10, 15, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn org() -> Organization {
    Organization {
        id: OrgId("org-1".to_string()),
        name: "Prairie Retail Group".to_string(),
        time_zone: "America/Chicago".to_string(),
        week_start: WeekStart::Monday,
        gating_policy: "completed_approved".to_string(),
    }
}

pub(super) fn branch() -> Branch {
    Branch {
        id: BranchId("br-1".to_string()),
        org_id: org().id,
        name: "Cedar Falls".to_string(),
        manager_id: Some(UserId("mgr-1".to_string())),
    }
}

pub(super) fn second_branch() -> Branch {
    Branch {
        id: BranchId("br-2".to_string()),
        org_id: org().id,
        name: "Waterloo".to_string(),
        manager_id: None,
    }
}

pub(super) fn survey() -> Survey {
    Survey {
        id: SurveyId("srv-1".to_string()),
        org_id: org().id,
        title: "Weekly Safety Walk".to_string(),
        version: 3,
        frequency: Frequency::Weekly,
        active: true,
        sections: vec![
            SurveySection {
                id: "sec-1".to_string(),
                title: "Floor".to_string(),
                questions: vec![
                    Question {
                        id: "q1".to_string(),
                        prompt: "Exits clear?".to_string(),
                        kind: QuestionKind::YesNo,
                        required: true,
                        weight: Some(QuestionWeight {
                            yes_points: 10,
                            no_points: 0,
                        }),
                    },
                    Question {
                        id: "q2".to_string(),
                        prompt: "Spill kit stocked?".to_string(),
                        kind: QuestionKind::YesNoNa,
                        required: true,
                        weight: Some(QuestionWeight {
                            yes_points: 5,
                            no_points: 0,
                        }),
                    },
                ],
            },
            SurveySection {
                id: "sec-2".to_string(),
                title: "Back room".to_string(),
                questions: vec![Question {
                    id: "q3".to_string(),
                    prompt: "Racking inspected?".to_string(),
                    kind: QuestionKind::YesNo,
                    required: false,
                    weight: None,
                }],
            },
        ],
    }
}

pub(super) fn auditor() -> User {
    User {
        id: UserId("aud-1".to_string()),
        org_id: org().id,
        name: "Dana Whitfield".to_string(),
        role: Role::Auditor,
    }
}

pub(super) fn other_auditor() -> User {
    User {
        id: UserId("aud-2".to_string()),
        org_id: org().id,
        name: "Sam Okafor".to_string(),
        role: Role::Auditor,
    }
}

pub(super) fn manager() -> User {
    User {
        id: UserId("mgr-1".to_string()),
        org_id: org().id,
        name: "Priya Nair".to_string(),
        role: Role::BranchManager,
    }
}

pub(super) fn admin() -> User {
    User {
        id: UserId("adm-1".to_string()),
        org_id: org().id,
        name: "Alex Boone".to_string(),
        role: Role::Admin,
    }
}

/// Audit pre-wired to the fixture org/branch/survey, assigned to `aud-1`.
pub(super) fn audit_record(id: &str, status: AuditStatus) -> Audit {
    let period_start = Utc
        .with_ymd_and_hms(2025, 6, 9, 5, 0, 0)
        .single()
        .expect("valid period start");
    let period_end = Utc
        .with_ymd_and_hms(2025, 6, 16, 4, 59, 59)
        .single()
        .expect("valid period end");

    Audit {
        id: AuditId(id.to_string()),
        org_id: org().id,
        branch_id: branch().id,
        survey_id: survey().id,
        survey_version: survey().version,
        assigned_to: Some(auditor().id),
        status,
        responses: BTreeMap::new(),
        na_reasons: BTreeMap::new(),
        section_comments: BTreeMap::new(),
        photos: BTreeMap::new(),
        score_overrides: BTreeMap::new(),
        submitted_by: None,
        submitted_at: None,
        approved_by: None,
        approved_at: None,
        approval_note: None,
        approval_signature: None,
        rejected_by: None,
        rejected_at: None,
        rejection_note: None,
        period_start,
        period_end,
        due_at: period_end,
        is_archived: false,
        archived_at: None,
        created_at: now(),
        updated_at: now(),
    }
}

pub(super) fn responses_update(entries: &[(&str, Answer)]) -> AuditUpdate {
    AuditUpdate {
        responses: entries
            .iter()
            .map(|(id, answer)| (id.to_string(), *answer))
            .collect(),
        ..AuditUpdate::default()
    }
}

#[derive(Default)]
pub(super) struct MemoryDirectory {
    orgs: Mutex<Vec<Organization>>,
    branches: Mutex<Vec<Branch>>,
    surveys: Mutex<Vec<Survey>>,
    users: Mutex<Vec<User>>,
    assignments: Mutex<Vec<AuditorAssignment>>,
    cursors: Mutex<HashMap<(OrgId, Frequency), DateTime<Utc>>>,
}

impl MemoryDirectory {
    pub(super) fn seeded() -> Self {
        let directory = Self::default();
        directory.add_org(org());
        directory.add_branch(branch());
        directory.add_survey(survey());
        for user in [auditor(), other_auditor(), manager(), admin()] {
            directory.add_user(user);
        }
        directory
    }

    pub(super) fn add_org(&self, org: Organization) {
        self.orgs.lock().expect("directory mutex poisoned").push(org);
    }

    pub(super) fn add_branch(&self, branch: Branch) {
        self.branches
            .lock()
            .expect("directory mutex poisoned")
            .push(branch);
    }

    pub(super) fn add_survey(&self, survey: Survey) {
        self.surveys
            .lock()
            .expect("directory mutex poisoned")
            .push(survey);
    }

    pub(super) fn add_user(&self, user: User) {
        self.users
            .lock()
            .expect("directory mutex poisoned")
            .push(user);
    }
}

impl Directory for MemoryDirectory {
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
        let org_users: Vec<&UserId> = users
            .iter()
            .filter(|user| &user.org_id == org_id)
            .map(|user| &user.id)
            .collect();
        Ok(self
            .assignments
            .lock()
            .expect("directory mutex poisoned")
            .iter()
            .filter(|assignment| org_users.contains(&&assignment.user_id))
            .cloned()
            .collect())
    }

    fn store_assignment(&self, assignment: AuditorAssignment) -> Result<(), RepositoryError> {
        let mut assignments = self.assignments.lock().expect("directory mutex poisoned");
        assignments.retain(|existing| existing.user_id != assignment.user_id);
        assignments.push(assignment);
        Ok(())
    }

    fn clear_branch_assignments(&self, org_id: &OrgId) -> Result<(), RepositoryError> {
        let users = self.users.lock().expect("directory mutex poisoned");
        let org_users: Vec<UserId> = users
            .iter()
            .filter(|user| &user.org_id == org_id)
            .map(|user| user.id.clone())
            .collect();
        drop(users);

        let mut assignments = self.assignments.lock().expect("directory mutex poisoned");
        for assignment in assignments.iter_mut() {
            if org_users.contains(&assignment.user_id) {
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
pub(super) struct MemoryAuditRepository {
    records: Mutex<HashMap<AuditId, Audit>>,
}

impl AuditRepository for MemoryAuditRepository {
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
        if !guard.contains_key(&audit.id) {
            return Err(RepositoryError::NotFound);
        }
        guard.insert(audit.id.clone(), audit);
        Ok(())
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

#[derive(Default)]
pub(super) struct MemoryNotifications {
    events: Mutex<Vec<AuditNotification>>,
}

impl MemoryNotifications {
    pub(super) fn events(&self) -> Vec<AuditNotification> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }
}

impl NotificationDispatcher for MemoryNotifications {
    fn dispatch(&self, notification: AuditNotification) -> Result<(), DispatchError> {
        self.events
            .lock()
            .expect("notification mutex poisoned")
            .push(notification);
        Ok(())
    }
}

/// Dispatcher that always fails, for asserting best-effort semantics.
pub(super) struct BrokenNotifications;

impl NotificationDispatcher for BrokenNotifications {
    fn dispatch(&self, _notification: AuditNotification) -> Result<(), DispatchError> {
        Err(DispatchError::Transport("smtp offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) struct TestEnv {
    pub(super) directory: Arc<MemoryDirectory>,
    pub(super) audits: Arc<MemoryAuditRepository>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) lifecycle:
        Arc<AuditLifecycle<MemoryDirectory, MemoryAuditRepository, MemoryNotifications>>,
    pub(super) scheduler: AuditScheduler<MemoryDirectory, MemoryAuditRepository>,
    pub(super) archiver: Archiver<MemoryAuditRepository>,
}

pub(super) fn build_env() -> TestEnv {
    let directory = Arc::new(MemoryDirectory::seeded());
    let audits = Arc::new(MemoryAuditRepository::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let lifecycle = Arc::new(AuditLifecycle::new(
        directory.clone(),
        audits.clone(),
        notifications.clone(),
    ));
    let scheduler = AuditScheduler::new(directory.clone(), audits.clone());
    let archiver = Archiver::new(audits.clone());

    TestEnv {
        directory,
        audits,
        notifications,
        lifecycle,
        scheduler,
        archiver,
    }
}
