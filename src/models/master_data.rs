//! Reference data maintained by back-office users: products, warehouses,
//! doctors and portfolios.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{Address, Entity, Listable};
use crate::{auth::consts, pricing::Money};

/// A master-data record that is created and replaced wholesale from a form.
pub trait MasterRecord: Listable + Serialize {
    type Form: Validate + DeserializeOwned + Send + Sync + 'static;

    const READ_PERMISSION: &'static str;
    const WRITE_PERMISSION: &'static str;

    fn from_form(form: Self::Form) -> Self;
    fn apply(&mut self, form: Self::Form);
    /// Business key, unique within the collection ignoring case
    fn business_key(&self) -> Option<&str> {
        None
    }
}

macro_rules! impl_entity {
    ($ty:ty, $name:literal) => {
        impl Entity for $ty {
            const NAME: &'static str = $name;

            fn id(&self) -> Uuid {
                self.id
            }

            fn version(&self) -> u64 {
                self.version
            }

            fn set_version(&mut self, version: u64) {
                self.version = version;
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }

            fn touch(&mut self, at: DateTime<Utc>) {
                self.updated_at = at;
            }

            fn unique_key(&self) -> Option<String> {
                self.business_key().map(str::to_uppercase)
            }
        }
    };
}

fn active_code(active: bool) -> Option<String> {
    Some(if active { "active" } else { "inactive" }.to_string())
}

fn default_true() -> bool {
    true
}

// Products

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub generic_name: Option<String>,
    pub hsn_code: Option<String>,
    pub unit_price: Money,
    pub gst_rate: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ProductForm {
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 64, message = "SKU is required"))]
    pub sku: String,
    #[serde(default)]
    #[validate(length(max = 200))]
    pub generic_name: Option<String>,
    #[serde(default)]
    #[validate(length(min = 4, max = 8, message = "HSN code must be 4 to 8 digits"))]
    pub hsn_code: Option<String>,
    pub unit_price: Money,
    pub gst_rate: Decimal,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl_entity!(Product, "Product");

impl Listable for Product {
    fn status_code(&self) -> Option<String> {
        active_code(self.is_active)
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.name.as_str(), self.sku.as_str()];
        text.extend(self.generic_name.as_deref());
        text.extend(self.hsn_code.as_deref());
        text
    }
}

impl MasterRecord for Product {
    type Form = ProductForm;

    const READ_PERMISSION: &'static str = consts::PRODUCTS_READ;
    const WRITE_PERMISSION: &'static str = consts::PRODUCTS_WRITE;

    fn from_form(form: ProductForm) -> Self {
        let now = Utc::now();
        let mut product = Self {
            id: Uuid::new_v4(),
            name: String::new(),
            sku: String::new(),
            generic_name: None,
            hsn_code: None,
            unit_price: Money::ZERO,
            gst_rate: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        product.apply(form);
        product
    }

    fn apply(&mut self, form: ProductForm) {
        self.name = form.name.trim().to_string();
        self.sku = form.sku.trim().to_uppercase();
        self.generic_name = form.generic_name;
        self.hsn_code = form.hsn_code;
        self.unit_price = form.unit_price;
        self.gst_rate = form.gst_rate;
        self.is_active = form.is_active;
    }

    fn business_key(&self) -> Option<&str> {
        Some(&self.sku)
    }
}

// Warehouses

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub address: Address,
    pub capacity: Option<i64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WarehouseForm {
    #[validate(length(min = 1, max = 200, message = "Warehouse name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "Warehouse code is required"))]
    pub code: String,
    #[validate]
    pub address: Address,
    #[serde(default)]
    #[validate(range(min = 0, message = "Capacity cannot be negative"))]
    pub capacity: Option<i64>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl_entity!(Warehouse, "Warehouse");

impl Listable for Warehouse {
    fn status_code(&self) -> Option<String> {
        active_code(self.is_active)
    }

    fn search_text(&self) -> Vec<&str> {
        vec![
            self.name.as_str(),
            self.code.as_str(),
            self.address.city.as_str(),
        ]
    }
}

impl MasterRecord for Warehouse {
    type Form = WarehouseForm;

    const READ_PERMISSION: &'static str = consts::WAREHOUSES_READ;
    const WRITE_PERMISSION: &'static str = consts::WAREHOUSES_WRITE;

    fn from_form(form: WarehouseForm) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: form.name.trim().to_string(),
            code: form.code.trim().to_uppercase(),
            address: form.address,
            capacity: form.capacity,
            is_active: form.is_active,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn apply(&mut self, form: WarehouseForm) {
        self.name = form.name.trim().to_string();
        self.code = form.code.trim().to_uppercase();
        self.address = form.address;
        self.capacity = form.capacity;
        self.is_active = form.is_active;
    }

    fn business_key(&self) -> Option<&str> {
        Some(&self.code)
    }
}

// Doctors

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub specialization: Option<String>,
    pub registration_number: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub portfolio_ids: Vec<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DoctorForm {
    #[validate(length(min = 1, max = 200, message = "Doctor name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 100))]
    pub specialization: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 64))]
    pub registration_number: Option<String>,
    #[serde(default)]
    #[validate(length(min = 7, max = 20, message = "Phone number is invalid"))]
    pub phone: Option<String>,
    #[serde(default)]
    #[validate(email(message = "Email is invalid"))]
    pub email: Option<String>,
    #[serde(default)]
    pub portfolio_ids: Vec<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl_entity!(Doctor, "Doctor");

impl Listable for Doctor {
    fn status_code(&self) -> Option<String> {
        active_code(self.is_active)
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.name.as_str()];
        text.extend(self.specialization.as_deref());
        text.extend(self.registration_number.as_deref());
        text
    }
}

impl MasterRecord for Doctor {
    type Form = DoctorForm;

    const READ_PERMISSION: &'static str = consts::DOCTORS_READ;
    const WRITE_PERMISSION: &'static str = consts::DOCTORS_WRITE;

    fn from_form(form: DoctorForm) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: form.name.trim().to_string(),
            specialization: form.specialization,
            registration_number: form.registration_number,
            phone: form.phone,
            email: form.email,
            portfolio_ids: form.portfolio_ids,
            is_active: form.is_active,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn apply(&mut self, form: DoctorForm) {
        self.name = form.name.trim().to_string();
        self.specialization = form.specialization;
        self.registration_number = form.registration_number;
        self.phone = form.phone;
        self.email = form.email;
        self.portfolio_ids = form.portfolio_ids;
        self.is_active = form.is_active;
    }

    fn business_key(&self) -> Option<&str> {
        self.registration_number.as_deref()
    }
}

// Portfolios

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub product_ids: Vec<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PortfolioForm {
    #[validate(length(min = 1, max = 200, message = "Portfolio name is required"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[serde(default)]
    pub product_ids: Vec<Uuid>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl_entity!(Portfolio, "Portfolio");

impl Listable for Portfolio {
    fn status_code(&self) -> Option<String> {
        active_code(self.is_active)
    }

    fn search_text(&self) -> Vec<&str> {
        let mut text = vec![self.name.as_str()];
        text.extend(self.description.as_deref());
        text
    }
}

impl MasterRecord for Portfolio {
    type Form = PortfolioForm;

    const READ_PERMISSION: &'static str = consts::PORTFOLIOS_READ;
    const WRITE_PERMISSION: &'static str = consts::PORTFOLIOS_WRITE;

    fn from_form(form: PortfolioForm) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: form.name.trim().to_string(),
            description: form.description,
            product_ids: form.product_ids,
            is_active: form.is_active,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    fn apply(&mut self, form: PortfolioForm) {
        self.name = form.name.trim().to_string();
        self.description = form.description;
        self.product_ids = form.product_ids;
        self.is_active = form.is_active;
    }

    fn business_key(&self) -> Option<&str> {
        Some(&self.name)
    }
}
