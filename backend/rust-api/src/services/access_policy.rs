use crate::{
    error::AppError,
    models::user::{Role, User},
};

/// Operations that need a role decision.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    CreateCourse,
    /// Edit a course or add lessons to it; `owner` is the course creator.
    ManageCourse { owner: &'a str },
    Enroll,
    ListOwnCourses,
    /// `owner` is the enrollment's learner.
    UpdateOwnEnrollment { owner: &'a str },
    ViewDashboard,
    TrackActivity,
    AskTutor,
    ViewOwnPerformance,
    RegisterProfile,
}

impl Action<'_> {
    fn describe(&self) -> &'static str {
        match self {
            Action::CreateCourse => "create courses",
            Action::ManageCourse { .. } => "manage this course",
            Action::Enroll => "enroll in courses",
            Action::ListOwnCourses => "list enrolled courses",
            Action::UpdateOwnEnrollment { .. } => "update this enrollment",
            Action::ViewDashboard => "view the dashboard",
            Action::TrackActivity => "track activity",
            Action::AskTutor => "ask the tutor",
            Action::ViewOwnPerformance => "view performance",
            Action::RegisterProfile => "register a profile",
        }
    }
}

pub fn is_allowed(user: &User, action: Action<'_>) -> bool {
    match action {
        Action::CreateCourse | Action::ViewDashboard => {
            matches!(user.role, Role::Admin | Role::Instructor)
        }
        Action::ManageCourse { owner } => match user.role {
            Role::Admin => true,
            Role::Instructor => user.id == owner,
            Role::Learner => false,
        },
        Action::Enroll | Action::ListOwnCourses => user.role == Role::Learner,
        Action::UpdateOwnEnrollment { owner } => user.role == Role::Learner && user.id == owner,
        Action::TrackActivity
        | Action::AskTutor
        | Action::ViewOwnPerformance
        | Action::RegisterProfile => true,
    }
}

pub fn authorize(user: &User, action: Action<'_>) -> Result<(), AppError> {
    if is_allowed(user, action) {
        Ok(())
    } else {
        tracing::warn!(
            "User {} ({}) denied: {}",
            user.id,
            user.role.as_str(),
            action.describe()
        );
        Err(AppError::forbidden(format!(
            "Not allowed to {}",
            action.describe()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> User {
        User::new(format!("sub-{}", role.as_str()), "x@example.com", role)
    }

    #[test]
    fn test_course_creation_is_staff_only() {
        assert!(is_allowed(&user(Role::Admin), Action::CreateCourse));
        assert!(is_allowed(&user(Role::Instructor), Action::CreateCourse));
        assert!(!is_allowed(&user(Role::Learner), Action::CreateCourse));
    }

    #[test]
    fn test_instructor_manages_only_own_course() {
        let instructor = user(Role::Instructor);
        assert!(is_allowed(
            &instructor,
            Action::ManageCourse {
                owner: &instructor.id
            }
        ));
        assert!(!is_allowed(
            &instructor,
            Action::ManageCourse { owner: "someone" }
        ));
        assert!(is_allowed(
            &user(Role::Admin),
            Action::ManageCourse { owner: "someone" }
        ));
    }

    #[test]
    fn test_enrollment_actions_are_learner_only() {
        let learner = user(Role::Learner);
        assert!(is_allowed(&learner, Action::Enroll));
        assert!(!is_allowed(&user(Role::Instructor), Action::Enroll));
        assert!(!is_allowed(&user(Role::Admin), Action::ListOwnCourses));
        assert!(is_allowed(
            &learner,
            Action::UpdateOwnEnrollment { owner: &learner.id }
        ));
        assert!(!is_allowed(
            &learner,
            Action::UpdateOwnEnrollment { owner: "other" }
        ));
    }

    #[test]
    fn test_authorize_maps_to_forbidden() {
        let err = authorize(&user(Role::Learner), Action::ViewDashboard).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(authorize(&user(Role::Learner), Action::AskTutor).is_ok());
        assert!(authorize(&user(Role::Learner), Action::RegisterProfile).is_ok());
    }
}
