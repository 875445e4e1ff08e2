//! Shared test schema: a two-entity team/member domain with a nullable text
//! field, a belongs-to foreign key, and its has-many back-reference.

use crate::prelude::*;
use serde::{Deserialize, Serialize};

//
// Team
//

static TEAM_FIELDS: &[FieldModel] = &[
    FieldModel::new("id", FieldKind::Int),
    FieldModel::new("name", FieldKind::Text),
];

static TEAM_RELATIONS: &[RelationModel] = &[RelationModel {
    name: "members",
    kind: RelationKind::HasMany,
    target: Member::model,
    fk_field: "team",
}];

static TEAM_MODEL: EntityModel = EntityModel {
    name: "team",
    fields: TEAM_FIELDS,
    relations: TEAM_RELATIONS,
    decode_values: crate::db::decode_values_of::<Team>,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Team {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub members: HasMany<Member>,
}

impl Team {
    pub fn new(id: u64, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            members: HasMany::new(),
        }
    }
}

impl Entity for Team {
    fn model() -> &'static EntityModel {
        &TEAM_MODEL
    }

    fn key(&self) -> u64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![Value::from(self.id), Value::from(self.name.clone())]
    }

    fn hydrate(&mut self, relation: &str, db: &Db) -> Result<(), ExecuteError> {
        match relation {
            "members" => {
                if self.members.is_loaded() {
                    return Ok(());
                }
                let rows: Vec<Member> = db
                    .scan::<Member>()?
                    .into_iter()
                    .filter(|member| member.team.key() == Some(self.id))
                    .collect();
                self.members.set_loaded(rows);

                Ok(())
            }
            other => Err(ExecuteError::UnknownRelation {
                entity: TEAM_MODEL.name,
                relation: other.to_string(),
            }),
        }
    }
}

//
// Member
//

static MEMBER_FIELDS: &[FieldModel] = &[
    FieldModel::new("id", FieldKind::Int),
    FieldModel::new("name", FieldKind::Text).nullable(),
    FieldModel::new("age", FieldKind::Int),
    FieldModel::new("team", FieldKind::Int).nullable(),
];

static MEMBER_RELATIONS: &[RelationModel] = &[RelationModel {
    name: "team",
    kind: RelationKind::BelongsTo,
    target: Team::model,
    fk_field: "team",
}];

static MEMBER_MODEL: EntityModel = EntityModel {
    name: "member",
    fields: MEMBER_FIELDS,
    relations: MEMBER_RELATIONS,
    decode_values: crate::db::decode_values_of::<Member>,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub(crate) struct Member {
    pub id: u64,
    pub name: Option<String>,
    pub age: i64,
    pub team: BelongsTo<Team>,
}

impl Member {
    pub fn new(id: u64, name: Option<&str>, age: i64, team: u64) -> Self {
        Self {
            id,
            name: name.map(ToString::to_string),
            age,
            team: BelongsTo::from(team),
        }
    }
}

impl Entity for Member {
    fn model() -> &'static EntityModel {
        &MEMBER_MODEL
    }

    fn key(&self) -> u64 {
        self.id
    }

    fn values(&self) -> Vec<Value> {
        vec![
            Value::from(self.id),
            Value::from(self.name.clone()),
            Value::from(self.age),
            Value::from(self.team.key()),
        ]
    }

    fn hydrate(&mut self, relation: &str, db: &Db) -> Result<(), ExecuteError> {
        match relation {
            "team" => {
                if self.team.is_loaded() {
                    return Ok(());
                }
                if let Some(key) = self.team.key() {
                    if let Some(team) = db.get::<Team>(key)? {
                        self.team.set_loaded(team);
                    }
                }

                Ok(())
            }
            other => Err(ExecuteError::UnknownRelation {
                entity: MEMBER_MODEL.name,
                relation: other.to_string(),
            }),
        }
    }
}

//
// Databases
//

pub(crate) fn empty_db() -> Db {
    Db::new().register::<Team>().register::<Member>()
}

/// Two teams, four members: ages 10/20/30/40, member3 without a name.
pub(crate) fn seeded_db() -> Db {
    let db = empty_db();
    {
        let session = db.session();
        session.insert(Team::new(1, "teamA")).unwrap();
        session.insert(Team::new(2, "teamB")).unwrap();
        session
            .insert(Member::new(1, Some("member1"), 10, 1))
            .unwrap();
        session
            .insert(Member::new(2, Some("member2"), 20, 1))
            .unwrap();
        session.insert(Member::new(3, None, 30, 2)).unwrap();
        session
            .insert(Member::new(4, Some("member4"), 40, 2))
            .unwrap();
    }

    db
}
