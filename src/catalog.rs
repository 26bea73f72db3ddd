//! Known courses and their ordered level IDs.

/// Number of levels in every known course.
pub const LEVELS_PER_COURSE: usize = 6;

/// A course offered by the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Course {
    /// Course ID as used by the API filters.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Level IDs, level 1 first.
    pub level_ids: [&'static str; LEVELS_PER_COURSE],
}

impl Course {
    /// Default deck name for exports of this course.
    #[must_use]
    pub fn deck_name(&self) -> String {
        format!("YoyoChinese {}", self.name)
    }
}

/// All known courses, in menu order.
pub const COURSES: &[Course] = &[
    Course {
        id: "5f9c5382c32d410f1447bee9",
        name: "Beginner Conversational",
        level_ids: [
            "5f9c5382c32d410f1447bef5",
            "5f9c5382c32d410f1447bef6",
            "5f9c5382c32d410f1447bef7",
            "5f9c5382c32d410f1447bef8",
            "5f9c5382c32d410f1447bef9",
            "5f9c5382c32d410f1447befa",
        ],
    },
    Course {
        id: "5f9c5382c32d410f1447beeb",
        name: "Chinese Characters",
        level_ids: [
            "5f9c5382c32d410f1447bf01",
            "5f9c5382c32d410f1447bf02",
            "5f9c5382c32d410f1447bf03",
            "5f9c5382c32d410f1447bf04",
            "5f9c5382c32d410f1447bf05",
            "5f9c5382c32d410f1447bf06",
        ],
    },
    Course {
        id: "5f9c5382c32d410f1447beea",
        name: "Intermediate Conversational",
        level_ids: [
            "5f9c5382c32d410f1447befb",
            "5f9c5382c32d410f1447befc",
            "5f9c5382c32d410f1447befd",
            "5f9c5382c32d410f1447befe",
            "5f9c5382c32d410f1447beff",
            "5f9c5382c32d410f1447bf00",
        ],
    },
    Course {
        id: "5f9c5382c32d410f1447beed",
        name: "Chinese Characters II",
        level_ids: [
            "5f9c5382c32d410f1447bf0d",
            "5f9c5382c32d410f1447bf0e",
            "5f9c5382c32d410f1447bf0f",
            "5f9c5382c32d410f1447bf10",
            "5f9c5382c32d410f1447bf11",
            "5f9c5382c32d410f1447bf12",
        ],
    },
    Course {
        id: "5f9c5382c32d410f1447beec",
        name: "Upper Intermediate Conversational",
        level_ids: [
            "5f9c5382c32d410f1447bf07",
            "5f9c5382c32d410f1447bf08",
            "5f9c5382c32d410f1447bf09",
            "5f9c5382c32d410f1447bf0a",
            "5f9c5382c32d410f1447bf0b",
            "5f9c5382c32d410f1447bf0c",
        ],
    },
    Course {
        id: "5f9c5382c32d410f1447beee",
        name: "Chinese Character Reader",
        level_ids: [
            "5f9c5382c32d410f1447bf13",
            "5f9c5382c32d410f1447bf14",
            "5f9c5382c32d410f1447bf15",
            "5f9c5382c32d410f1447bf16",
            "5f9c5382c32d410f1447bf17",
            "5f9c5382c32d410f1447bf18",
        ],
    },
];

/// Looks up a course by ID.
#[must_use]
pub fn find_course(id: &str) -> Option<&'static Course> {
    COURSES.iter().find(|course| course.id == id.trim())
}

/// Looks up a course by its 1-based menu position.
#[must_use]
pub fn course_by_index(index: usize) -> Option<&'static Course> {
    index.checked_sub(1).and_then(|i| COURSES.get(i))
}
