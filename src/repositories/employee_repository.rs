use async_trait::async_trait;
use sqlx::PgPool;

use crate::models::employee::Employee;
use crate::repositories::StoreError;

/// Read side of the employee table used by check-in matching.
#[async_trait]
pub trait EmployeeDirectory: Send + Sync {
    /// Enrolled employees that have a reference photo, in id order.
    async fn list_with_photo(&self) -> Result<Vec<Employee>, StoreError>;
}

#[derive(Clone)]
pub struct EmployeeRepository {
    pool: PgPool,
}

impl EmployeeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        name: &str,
        gender: Option<&str>,
        age: Option<i32>,
        department: Option<&str>,
        photo_url: Option<&str>,
    ) -> Result<Employee, StoreError> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            INSERT INTO employees (name, gender, age, department, photo_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, gender, age, department, photo_url, created_at
            "#,
        )
        .bind(name)
        .bind(gender)
        .bind(age)
        .bind(department)
        .bind(photo_url)
        .fetch_one(&self.pool)
        .await?;

        Ok(employee)
    }

    pub async fn list_all(&self) -> Result<Vec<Employee>, StoreError> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, name, gender, age, department, photo_url, created_at
            FROM employees
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(employees)
    }

    /// Removes the employee and returns the deleted row, if any.
    pub async fn delete(&self, id: i32) -> Result<Option<Employee>, StoreError> {
        let employee = sqlx::query_as::<_, Employee>(
            r#"
            DELETE FROM employees
            WHERE id = $1
            RETURNING id, name, gender, age, department, photo_url, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(employee)
    }
}

#[async_trait]
impl EmployeeDirectory for EmployeeRepository {
    async fn list_with_photo(&self) -> Result<Vec<Employee>, StoreError> {
        let employees = sqlx::query_as::<_, Employee>(
            r#"
            SELECT id, name, gender, age, department, photo_url, created_at
            FROM employees
            WHERE photo_url IS NOT NULL
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(employees)
    }
}
