//! Small-agency CRM: clients, their projects and quotes.

use super::{Domain, parse_status, rows, seed_time, unknown_collection};
use crate::collection::{Collection, Dependent, Dependents, Relation, relabel_dependents};
use crate::core::{HasStatus, RecordId, Result};
use crate::manager::RecordManager;
use crate::{Record, lifecycle};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

lifecycle! {
    pub enum ProjectStatus {
        Lead = "lead" => [Active, Cancelled],
        Active = "active" => [OnHold, Completed, Cancelled],
        OnHold = "on_hold" => [Active, Cancelled],
        Completed = "completed" => [],
        Cancelled = "cancelled" => [],
    }
}

lifecycle! {
    pub enum QuoteStatus {
        Draft = "draft" => [Sent],
        Sent = "sent" => [Accepted, Rejected],
        Accepted = "accepted" => [],
        Rejected = "rejected" => [Draft],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "client")]
pub struct Client {
    pub id: RecordId,
    #[record(required, search)]
    pub name: String,
    #[record(search)]
    pub email: String,
    #[record(search)]
    pub company: String,
    pub phone: String,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "project")]
pub struct Project {
    pub id: RecordId,
    #[record(required)]
    pub client_id: RecordId,
    #[record(search)]
    pub client_name: String,
    #[record(required, search)]
    pub title: String,
    #[record(non_negative)]
    pub budget: f64,
    pub status: ProjectStatus,
    #[serde(default, with = "crate::timestamp::option")]
    pub due_date: Option<DateTime<Utc>>,
}

impl HasStatus for Project {
    type Status = ProjectStatus;

    fn status(&self) -> ProjectStatus {
        self.status
    }

    fn set_status(&mut self, status: ProjectStatus) {
        self.status = status;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[serde(rename_all = "camelCase")]
#[record(kind = "quote")]
pub struct Quote {
    pub id: RecordId,
    #[record(required)]
    pub client_id: RecordId,
    #[record(search)]
    pub client_name: String,
    #[serde(default)]
    pub project_id: Option<RecordId>,
    #[serde(default)]
    #[record(search)]
    pub project_title: String,
    #[record(non_negative)]
    pub amount: f64,
    pub status: QuoteStatus,
    #[serde(with = "crate::timestamp")]
    pub issued_at: DateTime<Utc>,
}

impl HasStatus for Quote {
    type Status = QuoteStatus;

    fn status(&self) -> QuoteStatus {
        self.status
    }

    fn set_status(&mut self, status: QuoteStatus) {
        self.status = status;
    }
}

fn project_client(project: &Project) -> Option<&RecordId> {
    Some(&project.client_id)
}

fn project_client_label(project: &mut Project) -> &mut String {
    &mut project.client_name
}

fn quote_client(quote: &Quote) -> Option<&RecordId> {
    Some(&quote.client_id)
}

fn quote_client_label(quote: &mut Quote) -> &mut String {
    &mut quote.client_name
}

fn quote_project(quote: &Quote) -> Option<&RecordId> {
    quote.project_id.as_ref()
}

fn clear_quote_project(quote: &mut Quote) {
    quote.project_id = None;
}

fn quote_project_label(quote: &mut Quote) -> &mut String {
    &mut quote.project_title
}

pub static PROJECT_CLIENT: Relation<Project> =
    Relation::cascade("projects", project_client).with_label(project_client_label);

pub static QUOTE_CLIENT: Relation<Quote> =
    Relation::cascade("quotes", quote_client).with_label(quote_client_label);

/// Quotes survive their project and fall back to client-level quotes.
pub static QUOTE_PROJECT: Relation<Quote> =
    Relation::detach("quotes", quote_project, clear_quote_project).with_label(quote_project_label);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrmDashboard {
    pub clients: usize,
    pub active_projects: usize,
    pub active_budget: f64,
    pub open_quote_value: f64,
    pub won_value: f64,
    pub projects_by_status: BTreeMap<&'static str, usize>,
    pub quotes_by_status: BTreeMap<&'static str, usize>,
}

pub struct Crm {
    pub clients: Collection<Client>,
    pub projects: Collection<Project>,
    pub quotes: Collection<Quote>,
}

impl Crm {
    pub fn add_client(&mut self, name: &str, email: &str, company: &str) -> Result<Client> {
        self.clients.create(|id| Client {
            id,
            name: name.to_string(),
            email: email.to_string(),
            company: company.to_string(),
            phone: String::new(),
            created_at: Utc::now(),
        })
    }

    pub fn add_project(
        &mut self,
        client_id: &RecordId,
        title: &str,
        budget: f64,
        due_date: Option<DateTime<Utc>>,
    ) -> Result<Project> {
        let client_name = self.clients.require(client_id)?.name.clone();
        self.projects.create(|id| Project {
            id,
            client_id: client_id.clone(),
            client_name,
            title: title.to_string(),
            budget,
            status: ProjectStatus::Lead,
            due_date,
        })
    }

    /// Drafts a quote for a client, optionally tied to one of its projects.
    pub fn add_quote(
        &mut self,
        client_id: &RecordId,
        project_id: Option<&RecordId>,
        amount: f64,
    ) -> Result<Quote> {
        let client_name = self.clients.require(client_id)?.name.clone();
        let project_title = match project_id {
            Some(project_id) => self.projects.require(project_id)?.title.clone(),
            None => String::new(),
        };
        self.quotes.create(|id| Quote {
            id,
            client_id: client_id.clone(),
            client_name,
            project_id: project_id.cloned(),
            project_title,
            amount,
            status: QuoteStatus::Draft,
            issued_at: Utc::now(),
        })
    }

    /// Renames a client and refreshes the copies held by projects and quotes.
    pub fn rename_client(&mut self, id: &RecordId, name: &str) -> Result<Client> {
        let client = self.clients.update(id, |client| client.name = name.to_string())?;
        let mut projects = Dependent::new(&mut self.projects, &PROJECT_CLIENT);
        let mut quotes = Dependent::new(&mut self.quotes, &QUOTE_CLIENT);
        let mut dependents: [&mut dyn Dependents; 2] = [&mut projects, &mut quotes];
        relabel_dependents(id, &client.name, &mut dependents)?;
        Ok(client)
    }

    pub fn rename_project(&mut self, id: &RecordId, title: &str) -> Result<Project> {
        let project = self
            .projects
            .update(id, |project| project.title = title.to_string())?;
        let mut quotes = Dependent::new(&mut self.quotes, &QUOTE_PROJECT);
        relabel_dependents(id, &project.title, &mut [&mut quotes as &mut dyn Dependents])?;
        Ok(project)
    }

    /// Deletes a client together with its projects and quotes.
    pub fn remove_client(&mut self, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        let mut projects = Dependent::new(&mut self.projects, &PROJECT_CLIENT);
        let mut quotes = Dependent::new(&mut self.quotes, &QUOTE_CLIENT);
        let mut dependents: [&mut dyn Dependents; 2] = [&mut projects, &mut quotes];
        let removal = self.clients.remove_with(id, &mut dependents)?;
        Ok(removal.released)
    }

    pub fn remove_project(&mut self, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        let mut quotes = Dependent::new(&mut self.quotes, &QUOTE_PROJECT);
        let removal = self
            .projects
            .remove_with(id, &mut [&mut quotes as &mut dyn Dependents])?;
        Ok(removal.released)
    }
}

impl Domain for Crm {
    const NAME: &'static str = "crm";
    const COLLECTIONS: &'static [&'static str] = &["clients", "projects", "quotes"];

    type Dashboard = CrmDashboard;

    fn open(manager: &RecordManager) -> Result<Self> {
        Ok(Self {
            clients: manager.open("clients", seed_clients)?,
            projects: manager.open("projects", seed_projects)?,
            quotes: manager.open("quotes", seed_quotes)?,
        })
    }

    fn dashboard(&self) -> CrmDashboard {
        let active = |project: &Project| project.status == ProjectStatus::Active;
        CrmDashboard {
            clients: self.clients.len(),
            active_projects: self.projects.count_where(active),
            active_budget: self.projects.sum_where(active, |project| project.budget),
            open_quote_value: self
                .quotes
                .sum_where(|quote| quote.status == QuoteStatus::Sent, |quote| quote.amount),
            won_value: self
                .quotes
                .sum_where(|quote| quote.status == QuoteStatus::Accepted, |quote| quote.amount),
            projects_by_status: self.projects.status_counts(),
            quotes_by_status: self.quotes.status_counts(),
        }
    }

    fn counts(&self) -> Vec<(&'static str, usize)> {
        vec![
            ("clients", self.clients.len()),
            ("projects", self.projects.len()),
            ("quotes", self.quotes.len()),
        ]
    }

    fn list(&self, collection: &str, query: Option<&str>) -> Result<Vec<Value>> {
        match collection {
            "clients" => rows(&self.clients, query),
            "projects" => rows(&self.projects, query),
            "quotes" => rows(&self.quotes, query),
            other => unknown_collection(other),
        }
    }

    fn set_status(&mut self, collection: &str, id: &RecordId, status: &str) -> Result<()> {
        match collection {
            "projects" => {
                let status = parse_status::<Project>(status)?;
                self.projects.transition(id, status).map(|_| ())
            }
            "quotes" => {
                let status = parse_status::<Quote>(status)?;
                self.quotes.transition(id, status).map(|_| ())
            }
            other => unknown_collection(other),
        }
    }

    fn remove(&mut self, collection: &str, id: &RecordId) -> Result<Vec<(&'static str, usize)>> {
        match collection {
            "clients" => self.remove_client(id),
            "projects" => self.remove_project(id),
            "quotes" => self.quotes.remove(id).map(|_| Vec::new()),
            other => unknown_collection(other),
        }
    }
}

pub fn seed_clients() -> Vec<Client> {
    vec![
        Client {
            id: RecordId::new("1"),
            name: "Sarah Johnson".to_string(),
            email: "sarah@brightleaf.io".to_string(),
            company: "Brightleaf Studio".to_string(),
            phone: "555-0142".to_string(),
            created_at: seed_time(2024, 2, 1, 9, 0),
        },
        Client {
            id: RecordId::new("2"),
            name: "David Chen".to_string(),
            email: "david@northwind.com".to_string(),
            company: "Northwind Traders".to_string(),
            phone: "555-0188".to_string(),
            created_at: seed_time(2024, 2, 3, 11, 15),
        },
    ]
}

pub fn seed_projects() -> Vec<Project> {
    vec![
        Project {
            id: RecordId::new("1"),
            client_id: RecordId::new("1"),
            client_name: "Sarah Johnson".to_string(),
            title: "Website Redesign".to_string(),
            budget: 12000.0,
            status: ProjectStatus::Active,
            due_date: Some(seed_time(2024, 4, 30, 17, 0)),
        },
        Project {
            id: RecordId::new("2"),
            client_id: RecordId::new("2"),
            client_name: "David Chen".to_string(),
            title: "Inventory Dashboard".to_string(),
            budget: 8500.0,
            status: ProjectStatus::Lead,
            due_date: None,
        },
    ]
}

pub fn seed_quotes() -> Vec<Quote> {
    vec![
        Quote {
            id: RecordId::new("1"),
            client_id: RecordId::new("1"),
            client_name: "Sarah Johnson".to_string(),
            project_id: Some(RecordId::new("1")),
            project_title: "Website Redesign".to_string(),
            amount: 12000.0,
            status: QuoteStatus::Accepted,
            issued_at: seed_time(2024, 2, 5, 10, 0),
        },
        Quote {
            id: RecordId::new("2"),
            client_id: RecordId::new("2"),
            client_name: "David Chen".to_string(),
            project_id: Some(RecordId::new("2")),
            project_title: "Inventory Dashboard".to_string(),
            amount: 8500.0,
            status: QuoteStatus::Sent,
            issued_at: seed_time(2024, 2, 8, 15, 30),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    fn open() -> Crm {
        let manager = RecordManager::new(Arc::new(MemoryStore::new()), Crm::NAME);
        Crm::open(&manager).unwrap()
    }

    #[test]
    fn removing_a_client_cascades_to_projects_and_quotes() {
        let mut crm = open();
        let released = crm.remove_client(&RecordId::new("1")).unwrap();
        assert_eq!(released, vec![("projects", 1), ("quotes", 1)]);
        assert!(crm.projects.iter().all(|project| project.client_id != "1"));
        assert!(crm.quotes.iter().all(|quote| quote.client_id != "1"));
        assert_eq!(crm.clients.len(), 1);
    }

    #[test]
    fn removing_a_project_keeps_its_quotes() {
        let mut crm = open();
        crm.remove_project(&RecordId::new("2")).unwrap();
        let quote = crm.quotes.get(&RecordId::new("2")).unwrap();
        assert_eq!(quote.project_id, None);
        assert!(quote.project_title.is_empty());
    }

    #[test]
    fn renaming_a_client_updates_every_copy() {
        let mut crm = open();
        crm.rename_client(&RecordId::new("2"), "David Chen-Li").unwrap();
        assert_eq!(
            crm.projects.get(&RecordId::new("2")).unwrap().client_name,
            "David Chen-Li"
        );
        assert_eq!(
            crm.quotes.get(&RecordId::new("2")).unwrap().client_name,
            "David Chen-Li"
        );
    }

    #[test]
    fn completed_projects_cannot_reopen() {
        let mut crm = open();
        let id = RecordId::new("1");
        crm.projects.transition(&id, ProjectStatus::Completed).unwrap();
        let err = crm.projects.transition(&id, ProjectStatus::Active).unwrap_err();
        assert!(matches!(err, crate::RecordError::InvalidTransition { .. }));
    }

    #[test]
    fn dashboard_splits_open_and_won_quotes() {
        let crm = open();
        let dashboard = crm.dashboard();
        assert_eq!(dashboard.active_projects, 1);
        assert_eq!(dashboard.active_budget, 12000.0);
        assert_eq!(dashboard.open_quote_value, 8500.0);
        assert_eq!(dashboard.won_value, 12000.0);
        assert_eq!(dashboard.projects_by_status["on_hold"], 0);
    }
}
