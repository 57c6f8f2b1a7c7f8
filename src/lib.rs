/*!
# Asset Tracker

A fixed-asset tracking service with an approval workflow, built in Rust.

## Overview

The service keeps a register of physical assets (laptops, furniture, vehicles,
machinery) together with their placement, purchase data and straight-line
depreciation. Nothing about an asset changes directly: every registration,
edit, relocation, damage report, repair action, disposal and loss report is
submitted as an approval request, routed to exactly one approver role, and
applied to the register only when that approver accepts it.

## Architecture

### Domain Layer
- **Asset register** - assets, their status lifecycle and financial fields
- **Depreciation** - straight-line book value per category
- **Reference data** - categories, locations/rooms, companies and owners
- **Activity log** - damage, repair, relocation, disposal and loss history

### Workflow Layer
- **Routing** - who may submit which request type and who decides it
- **Replay** - applies an approved request's payload to the register
- **Queries** - per-user request views and approver inboxes

### Persistence Layer
- Store snapshot with Gzip compression and bincode serialization
- User accounts in a JSON file with Argon2 password hashes
- Copy-on-write transactions: nothing is committed unless it was written

### Web Layer (`web` feature)
- JSON API over axum with cookie sessions
- Request tracing through `tower-http`

## Roles

- **staff** - submits requests, never approves
- **manager** - submits any request, approves requests submitted by admins
- **admin** - submits any request, approves requests submitted by staff and
  managers, manages users, locations and depreciation runs

## Modules

- **config**: Runtime configuration from the environment
- **error**: Application error type and its HTTP mapping
- **role**: User roles
- **login**: User accounts, password handling and sessions
- **reference**: Lookup tables and depreciation categories
- **depreciation**: Straight-line depreciation
- **asset**: Assets, statuses and edits
- **activity**: Per-asset activity history
- **workflow**: Approval request lifecycle
- **repair**: Direct return of repaired assets to service
- **store**: The transactional asset store
- **saving**: Snapshot persistence with compression
- **summary**: Dashboard figures
- **pagination**: Paged listings
- **app**: Routing and middleware

## REST API Endpoints

- `POST /login`, `POST /logout`, `GET /health`
- `GET /api/assets` - Paged asset list, optional `status` filter
- `GET /api/assets/{id}`, `GET /api/assets/{id}/history`
- `GET /api/activity/{kind}` - Damage, repair, lost, disposal or relocation log
- `POST /api/requests` - Submit an approval request
- `GET /api/approvals`, `GET /api/approvals/inbox`, `GET /api/approvals/{id}`
- `POST /api/approvals/{id}/approve`, `/reject`, `/cancel`
- `POST /api/repair/{id}/allocate` - Return a repaired asset to service
- `POST /api/depreciation/update` - Recompute book values (admin)
- `GET /api/summary`, `GET /api/reference`, `POST /api/reference/locations`
- `GET /api/users`, `POST /api/users` - User administration (admin)
- `POST /api/users/{username}/active`, `POST /api/users/{username}/reset_password`
- `POST /api/profile` - Update one's own name and business unit
- `POST /api/users/{username}/profile` - Update any profile or role (admin)
- `POST /api/password` - Change one's own password
*/

pub mod activity;
#[cfg(feature = "web")]
pub mod app;
pub mod asset;
pub mod config;
pub mod depreciation;
pub mod error;
pub mod login;
pub mod pagination;
pub mod reference;
pub mod repair;
pub mod role;
pub mod saving;
pub mod store;
pub mod summary;
pub mod workflow;

pub use asset::{Asset, AssetEdit, AssetStatus, NewAsset, Placement};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use login::{User, UserDirectory};
pub use role::Role;
pub use store::Store;
pub use workflow::{ApprovalRequest, ApprovalStatus, RequestPayload, RequestType, Submission};
