//! Mutex-backed stores used by the demo binary and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::domain::{Application, ApplicationId, DriveId, JobDrive, StudentId};
use super::repository::{
    ApplicationRepository, ApplicationUpdate, DriveRepository, RepositoryError,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default, Clone)]
pub struct InMemoryDriveRepository {
    drives: Arc<Mutex<BTreeMap<DriveId, JobDrive>>>,
}

impl DriveRepository for InMemoryDriveRepository {
    fn insert(&self, drive: JobDrive) -> Result<JobDrive, RepositoryError> {
        let mut guard = lock(&self.drives);
        if guard.contains_key(&drive.drive_id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(drive.drive_id.clone(), drive.clone());
        Ok(drive)
    }

    fn fetch(&self, id: &DriveId) -> Result<Option<JobDrive>, RepositoryError> {
        Ok(lock(&self.drives).get(id).cloned())
    }

    fn list(&self) -> Result<Vec<JobDrive>, RepositoryError> {
        Ok(lock(&self.drives).values().cloned().collect())
    }

    fn update(&self, drive: JobDrive, expected_version: u64) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.drives);
        let stored = guard
            .get_mut(&drive.drive_id)
            .ok_or(RepositoryError::NotFound)?;
        if stored.version != expected_version {
            return Err(RepositoryError::VersionConflict(drive.drive_id.0.clone()));
        }
        *stored = drive;
        Ok(())
    }
}

#[derive(Default)]
struct ApplicationTables {
    records: HashMap<ApplicationId, Application>,
    order: Vec<ApplicationId>,
}

impl ApplicationTables {
    fn ordered(&self) -> impl Iterator<Item = &Application> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }
}

#[derive(Default, Clone)]
pub struct InMemoryApplicationRepository {
    tables: Arc<Mutex<ApplicationTables>>,
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, application: Application) -> Result<Application, RepositoryError> {
        let mut guard = lock(&self.tables);
        let duplicate = guard.records.contains_key(&application.application_id)
            || guard.records.values().any(|existing| {
                existing.is_active()
                    && existing.student_id == application.student_id
                    && existing.drive_id == application.drive_id
            });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }
        guard.order.push(application.application_id.clone());
        guard
            .records
            .insert(application.application_id.clone(), application.clone());
        Ok(application)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<Application>, RepositoryError> {
        Ok(lock(&self.tables).records.get(id).cloned())
    }

    fn find_active(
        &self,
        student_id: &StudentId,
        drive_id: &DriveId,
    ) -> Result<Option<Application>, RepositoryError> {
        let guard = lock(&self.tables);
        Ok(guard
            .ordered()
            .filter(|record| {
                record.is_active() && &record.student_id == student_id && &record.drive_id == drive_id
            })
            .last()
            .cloned())
    }

    fn for_student(&self, student_id: &StudentId) -> Result<Vec<Application>, RepositoryError> {
        let guard = lock(&self.tables);
        Ok(guard
            .ordered()
            .filter(|record| &record.student_id == student_id)
            .cloned()
            .collect())
    }

    fn for_drive(&self, drive_id: &DriveId) -> Result<Vec<Application>, RepositoryError> {
        let guard = lock(&self.tables);
        Ok(guard
            .ordered()
            .filter(|record| &record.drive_id == drive_id)
            .cloned()
            .collect())
    }

    fn all(&self) -> Result<Vec<Application>, RepositoryError> {
        Ok(lock(&self.tables).ordered().cloned().collect())
    }

    fn commit(&self, updates: Vec<ApplicationUpdate>) -> Result<(), RepositoryError> {
        let mut guard = lock(&self.tables);
        for update in &updates {
            let id = &update.application.application_id;
            let stored = guard.records.get(id).ok_or(RepositoryError::NotFound)?;
            if stored.version != update.expected_version {
                return Err(RepositoryError::VersionConflict(id.0.clone()));
            }
        }
        for update in updates {
            guard
                .records
                .insert(update.application.application_id.clone(), update.application);
        }
        Ok(())
    }
}
