use uuid::Uuid;

use crate::models::Role;

pub fn has_role(roles: &[Role], role: Role) -> bool {
    roles.contains(&Role::Admin) || roles.contains(&role)
}

/// Events are managed by admins and by the organizer profile that owns them.
pub fn can_manage_event(roles: &[Role], own_organizer: Option<Uuid>, event_organizer: Uuid) -> bool {
    if roles.contains(&Role::Admin) {
        return true;
    }
    roles.contains(&Role::Organizer) && own_organizer == Some(event_organizer)
}

/// Orders are visible to the buyer and to whoever manages the event.
pub fn can_view_order(caller: Uuid, buyer: Uuid, manages_event: bool) -> bool {
    caller == buyer || manages_event
}
