//! Role policy: landing routes, role-set checks and navigation visibility.
//!
//! Every route and menu entry lists its allowed roles in full. There is no
//! implicit hierarchy: a page open to librarians and admins names both.

use std::collections::BTreeSet;

use crate::models::{Role, Route};

/// Landing route after sign-in. Unknown or absent roles land on the public catalog.
pub fn default_route_for(role: Option<Role>) -> Route {
    match role {
        Some(Role::Admin) => Route::AdminHome,
        Some(Role::Librarian) => Route::LibrarianHome,
        Some(Role::Student) => Route::StudentHome,
        Some(Role::Unknown) | None => Route::Opac,
    }
}

/// Same as [`default_route_for`], for role strings straight from storage or the wire
pub fn default_route_for_name(role: &str) -> Route {
    default_route_for(Some(Role::from(role)))
}

/// True when `required` is empty or names `role`
pub fn role_satisfies(role: Role, required: &BTreeSet<Role>) -> bool {
    required.is_empty() || required.contains(&role)
}

/// One navigation menu entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MenuItem {
    pub name: &'static str,
    pub path: &'static str,
    pub roles: &'static [Role],
}

const ALL: &[Role] = &[Role::Admin, Role::Librarian, Role::Student];
const ADMIN: &[Role] = &[Role::Admin];
const LIBRARIAN: &[Role] = &[Role::Librarian];
const STAFF: &[Role] = &[Role::Admin, Role::Librarian];
const STUDENT: &[Role] = &[Role::Student];

/// Portal navigation, in display order
pub const MENU: &[MenuItem] = &[
    MenuItem { name: "OPAC Search", path: "/opac", roles: ALL },
    MenuItem { name: "Dashboard", path: "/admin", roles: ADMIN },
    MenuItem { name: "User Management", path: "/admin/users", roles: ADMIN },
    MenuItem { name: "System Reports", path: "/admin/reports", roles: ADMIN },
    MenuItem { name: "Dashboard", path: "/librarian", roles: LIBRARIAN },
    MenuItem { name: "Book Management", path: "/librarian/books", roles: STAFF },
    MenuItem { name: "Borrowing & Returns", path: "/librarian/borrowing", roles: STAFF },
    MenuItem { name: "Overdue Books", path: "/librarian/overdue", roles: STAFF },
    MenuItem { name: "My Dashboard", path: "/student", roles: STUDENT },
    MenuItem { name: "My Borrowed Books", path: "/student/borrowed", roles: STUDENT },
    MenuItem { name: "Borrowing History", path: "/student/history", roles: STUDENT },
];

/// Menu entries visible to `role`
pub fn visible_menu(role: Role) -> Vec<&'static MenuItem> {
    MENU.iter().filter(|item| item.roles.contains(&role)).collect()
}

/// Role flags for conditional content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleCheck {
    role: Option<Role>,
}

impl RoleCheck {
    pub fn new(role: Option<Role>) -> Self {
        Self { role }
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(Role::Admin)
    }

    /// Librarian views are open to admins too
    pub fn is_librarian(&self) -> bool {
        matches!(self.role, Some(Role::Admin | Role::Librarian))
    }

    pub fn is_student(&self) -> bool {
        self.role == Some(Role::Student)
    }

    /// False when signed out, whatever `roles` holds
    pub fn has_any(&self, roles: &[Role]) -> bool {
        self.role.is_some_and(|role| roles.contains(&role))
    }
}
