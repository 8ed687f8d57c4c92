use crate::{jwt::SessionData, schema::UserRole};

const MEMBER_ACTIONS: &[ActionType] = &[
    ActionType::CreateRecipes,
    ActionType::ManageOwnRecipes,
    ActionType::ManageOwnFavorites,
    ActionType::ManageOwnCart,
    ActionType::ManageOwnSubscriptions,
    ActionType::ManageOwnAccount,
];

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (UserRole::User, MEMBER_ACTIONS),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnFavorites,
            ActionType::ManageOwnCart,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageOwnAccount,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ],
    ),
];

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnFavorites,
    ManageOwnCart,
    ManageOwnSubscriptions,
    ManageOwnAccount,

    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let role = &session.role;

        ACTION_TABLE
            .iter()
            .find_map(|(r, actions)| {
                if role != r {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: UserRole) -> SessionData {
        SessionData {
            user_id: 1,
            username: String::from("someone"),
            role,
        }
    }

    #[test]
    fn members_manage_their_own_things() {
        let user = session(UserRole::User);

        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(ActionType::ManageOwnFavorites.authenticate(&user));
        assert!(ActionType::ManageOwnCart.authenticate(&user));
        assert!(!ActionType::ManageAllRecipes.authenticate(&user));
        assert!(!ActionType::ManageTags.authenticate(&user));
        assert!(!ActionType::ManageIngredients.authenticate(&user));
    }

    #[test]
    fn admins_can_do_everything() {
        let admin = session(UserRole::Admin);

        for action in [
            ActionType::CreateRecipes,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
            ActionType::ManageOwnSubscriptions,
        ] {
            assert!(action.authenticate(&admin));
        }
    }
}
