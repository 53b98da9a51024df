//! Built-in reference data

use crate::models::{Course, CourseLevel, Role};

fn course(
    slug: &str,
    title: &str,
    subtitle: &str,
    description: &str,
    level: CourseLevel,
    duration_weeks: i32,
    sort_order: i32,
) -> Course {
    Course {
        slug: slug.to_string(),
        title: title.to_string(),
        subtitle: Some(subtitle.to_string()),
        description: description.to_string(),
        level,
        duration_weeks: Some(duration_weeks),
        price_cents: 0,
        is_published: true,
        sort_order,
    }
}

/// Courses offered on the platform
pub fn course_catalog() -> Vec<Course> {
    vec![
        course(
            "ai-foundations-concept-to-application",
            "AI Foundations: From Concept to Application",
            "Understand how modern AI works and put it to use",
            "A practical introduction to machine learning and generative AI for \
             professionals, from core concepts to shipping a first applied project.",
            CourseLevel::Beginner,
            6,
            10,
        ),
        course(
            "prompt-engineering-for-teams",
            "Prompt Engineering for Teams",
            "Reliable prompting patterns for everyday work",
            "Design, test and share prompts that hold up across a team, with review \
             workflows and evaluation checklists.",
            CourseLevel::Intermediate,
            4,
            20,
        ),
        course(
            "strategic-skills-architecture",
            "Strategic Skills Architecture",
            "Map the skills your organisation needs next",
            "A framework for leaders to assess current capabilities, identify skill \
             gaps and plan learning paths aligned with strategy.",
            CourseLevel::Advanced,
            8,
            30,
        ),
    ]
}

/// Roles granted to platform users
pub fn role_catalog() -> Vec<Role> {
    [
        ("admin", "Administrator", "Full access to platform administration"),
        ("instructor", "Instructor", "Creates and manages course content"),
        ("learner", "Learner", "Enrolls in and completes courses"),
    ]
    .into_iter()
    .map(|(name, display_name, description)| Role {
        name: name.to_string(),
        display_name: display_name.to_string(),
        description: Some(description.to_string()),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_contains_flagship_course() {
        assert!(
            course_catalog()
                .iter()
                .any(|c| c.slug == "ai-foundations-concept-to-application")
        );
    }

    #[test]
    fn test_natural_keys_are_unique() {
        let courses = course_catalog();
        let slugs: HashSet<_> = courses.iter().map(|c| c.slug.as_str()).collect();
        assert_eq!(slugs.len(), courses.len());

        let roles = role_catalog();
        let names: HashSet<_> = roles.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names.len(), roles.len());
    }
}
